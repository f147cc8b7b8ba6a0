// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;

use thiserror::Error;

use crate::core::capability::CapabilityScope;
use crate::core::flip_event::FlipToken;
use crate::egl::EglError;

/// Failures while bringing the pipeline up. None of these leave a usable
/// pipeline behind; the process is expected to stop.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to load the EGL library: {0}")]
    LoadFailed(String),

    #[error("required {scope} capability {name} not found")]
    MissingCapability {
        scope: CapabilityScope,
        name: &'static str,
    },

    #[error("failed to query EGL devices: {0}")]
    DeviceQueryFailed(EglError),

    #[error("no EGL devices found")]
    NoDevicesFound,

    #[error("no EGL device advertises EGL_EXT_device_drm")]
    NoCompatibleDevice,

    #[error("no DRM device file found for EGL device")]
    NoDeviceFile,

    #[error("unable to open DRM device file {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to get EGLDisplay from EGLDevice: {0}")]
    DisplayFailed(EglError),

    #[error("failed to initialize EGLDisplay: {0}")]
    InitFailed(EglError),

    #[error("failed to bind the OpenGL client API: {0}")]
    BindApiFailed(EglError),

    #[error("no EGL config matches the stream/OpenGL requirements")]
    NoMatchingConfig,

    #[error("eglCreateContext() failed: {0}")]
    ContextCreateFailed(EglError),

    #[error("unable to get EGLOutputLayer for plane {plane_id:#x} (crtc {crtc_id:#010x})")]
    NoMatchingOutput { crtc_id: u32, plane_id: u32 },

    #[error("unable to create stream: {0}")]
    StreamCreateFailed(EglError),

    #[error("unable to bind output layer as stream consumer: {0}")]
    ConsumerBindFailed(EglError),

    #[error("unable to create stream producer surface: {0}")]
    SurfaceCreateFailed(EglError),

    #[error("unable to make context and surface current: {0}")]
    MakeCurrentFailed(EglError),
}

/// Failures inside the frame loop.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("eglSwapBuffers failed for output {token}: {source}")]
    SwapFailed {
        token: FlipToken,
        #[source]
        source: EglError,
    },

    #[error("stream acquire failed for output {token}: {source}")]
    AcquireFailed {
        token: FlipToken,
        #[source]
        source: EglError,
    },

    #[error("eglMakeCurrent failed for output {token}: {source}")]
    MakeCurrentFailed {
        token: FlipToken,
        #[source]
        source: EglError,
    },

    #[error("DRM event source failed: {0}")]
    EventSource(#[from] std::io::Error),
}

/// Whether the frame loop may keep going after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Recoverable,
    Fatal,
}

impl FrameError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::SwapFailed { .. } | Self::AcquireFailed { .. } | Self::MakeCurrentFailed { .. } => {
                Severity::Recoverable
            }
            Self::EventSource(_) => Severity::Fatal,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which phase of the process an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Setup,
    SteadyState,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl Error {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Config(_) => Phase::Config,
            Self::Setup(_) => Phase::Setup,
            Self::Frame(_) => Phase::SteadyState,
        }
    }

    /// Config and setup errors always end the process; frame errors only
    /// when the event source itself is gone.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Setup(_) => true,
            Self::Frame(err) => err.severity() == Severity::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
