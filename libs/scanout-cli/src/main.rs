// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! scanout CLI
//!
//! Drives the EGLStream presentation pipeline on the first DRM-capable
//! GPU, presenting an animated clear colour on each configured plane.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use scanout::linux::{DrmEventReader, KhronosEgl};
use scanout::{
    build_pipeline, create_render_context, open_display, select_device, ConfigError,
    DisplayConnection, FrameScheduler, Pipeline, PresentConfig, RenderContext, TargetSpec,
};

mod renderer;

use renderer::ClearColorRenderer;

#[derive(Parser)]
#[command(name = "scanout")]
#[command(author, version, about = "Present EGLStream frames on DRM/KMS planes", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CRTC driving the plane (diagnostics only)
    #[arg(long, value_parser = parse_id)]
    crtc: Option<u32>,

    /// DRM plane to present on
    #[arg(long, value_parser = parse_id)]
    plane: Option<u32>,

    /// Surface width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Surface height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Stop after presenting this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Log filter used when RUST_LOG is not set (e.g. "scanout=debug")
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

/// Decimal or `0x`-prefixed hex, as DRM object ids are usually printed.
fn parse_id(raw: &str) -> Result<u32, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|err| format!("invalid id {raw:?}: {err}"))
}

/// Config file (if any) with the command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<PresentConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => PresentConfig::load(path)?,
        None => PresentConfig::default(),
    };

    if cli.plane.is_some() || cli.width.is_some() || cli.height.is_some() || cli.crtc.is_some() {
        match config.outputs.first_mut() {
            Some(first) => {
                first.crtc_id = cli.crtc.unwrap_or(first.crtc_id);
                first.plane_id = cli.plane.unwrap_or(first.plane_id);
                first.width = cli.width.unwrap_or(first.width);
                first.height = cli.height.unwrap_or(first.height);
            }
            None => {
                let (Some(plane_id), Some(width), Some(height)) = (cli.plane, cli.width, cli.height)
                else {
                    return Err(ConfigError::Invalid(
                        "--plane, --width and --height are required without a config file output"
                            .into(),
                    ));
                };
                config.outputs.push(TargetSpec {
                    crtc_id: cli.crtc.unwrap_or(0),
                    plane_id,
                    width,
                    height,
                });
            }
        }
    }

    if cli.frames.is_some() {
        config.scheduler.max_frames = cli.frames;
    }
    if cli.log.is_some() {
        config.log_filter = cli.log.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(fallback: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback.unwrap_or("info")))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build one pipeline per output, all sharing `context`. Already built
/// pipelines are torn down if a later one fails.
fn build_pipelines(
    egl: &KhronosEgl,
    connection: &DisplayConnection,
    context: &RenderContext,
    outputs: &[TargetSpec],
) -> Result<Vec<Pipeline>> {
    let mut pipelines = Vec::with_capacity(outputs.len());
    for target in outputs {
        match build_pipeline(egl, connection, context, target) {
            Ok(pipeline) => pipelines.push(pipeline),
            Err(err) => {
                teardown(egl, pipelines);
                return Err(scanout::Error::from(err))
                    .with_context(|| format!("Failed to set up plane {:#x}", target.plane_id));
            }
        }
    }
    Ok(pipelines)
}

fn teardown(egl: &KhronosEgl, pipelines: Vec<Pipeline>) {
    for pipeline in pipelines {
        let plane = pipeline.output().plane_id();
        if let Err(err) = pipeline.teardown(egl) {
            tracing::warn!("Teardown of plane {:#x} failed: {}", plane, err);
        }
    }
}

fn destroy_context(egl: &KhronosEgl, context: RenderContext) {
    if let Err(err) = context.destroy(egl) {
        tracing::warn!("Failed to destroy render context: {}", err);
    }
}

fn present(config: &PresentConfig) -> Result<u64> {
    let egl = KhronosEgl::load().map_err(scanout::Error::from)?;
    let device = select_device(&egl).map_err(scanout::Error::from)?;
    let connection = open_display(&egl, device)
        .map_err(scanout::Error::from)
        .context("Failed to open the EGL display")?;

    let context = create_render_context(&egl, &connection).map_err(scanout::Error::from)?;
    let pipelines = match build_pipelines(&egl, &connection, &context, &config.outputs) {
        Ok(pipelines) => pipelines,
        Err(err) => {
            destroy_context(&egl, context);
            return Err(err);
        }
    };
    gl::load_with(|name| egl.get_proc_address(name));

    let result = {
        let events = DrmEventReader::new(connection.drm_fd());
        let mut scheduler = FrameScheduler::new(&egl, events, &config.scheduler);
        for pipeline in &pipelines {
            scheduler.add_output(pipeline);
        }
        scheduler.run(&mut ClearColorRenderer)
    };

    teardown(&egl, pipelines);
    destroy_context(&egl, context);
    result
        .map_err(scanout::Error::from)
        .context("Frame loop stopped")
}

fn main() -> ExitCode {
    // Load .env for development
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = resolve_config(&cli);

    let fallback = match &config {
        Ok(config) => config.log_filter.clone(),
        Err(_) => cli.log.clone(),
    };
    init_logging(fallback.as_deref());

    let result = config
        .map_err(scanout::Error::from)
        .context("Invalid configuration")
        .and_then(|config| present(&config));

    match result {
        Ok(frames) => {
            tracing::info!("Presented {} frames", frames);
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<scanout::Error>() {
                Some(scanout_err) => {
                    tracing::error!(phase = ?scanout_err.phase(), "{:#}", err)
                }
                None => tracing::error!("{:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
