// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Presentation configuration.
//!
//! Loaded from TOML. The output geometry normally comes from whatever
//! picked the mode and plane; the file (or CLI flags) just carries it in.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::ConfigError;

/// One scan-out target, as chosen by mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TargetSpec {
    /// CRTC driving the plane. Only used for diagnostics.
    #[serde(default)]
    pub crtc_id: u32,
    /// DRM plane whose output layer consumes the stream.
    pub plane_id: u32,
    /// Producer surface width in pixels
    pub width: u32,
    /// Producer surface height in pixels
    pub height: u32,
}

/// Frame loop tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Stop after this many presented frames. Runs forever when unset.
    pub max_frames: Option<u64>,
    /// Extra immediate attempts after a failed stream acquire.
    pub acquire_retries: u32,
    /// FPS report interval in milliseconds; 0 disables reporting.
    pub stats_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            acquire_retries: 0,
            stats_interval_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_ms > 0).then(|| Duration::from_millis(self.stats_interval_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
    pub outputs: Vec<TargetSpec>,
    pub scheduler: SchedulerConfig,
}

impl PresentConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), outputs = config.outputs.len(), "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outputs.is_empty() {
            return Err(ConfigError::Invalid("no outputs configured".into()));
        }

        let mut planes = HashSet::new();
        for output in &self.outputs {
            if output.width == 0 || output.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "plane {:#x} has an empty {}x{} surface",
                    output.plane_id, output.width, output.height
                )));
            }
            if !planes.insert(output.plane_id) {
                return Err(ConfigError::Invalid(format!(
                    "plane {:#x} configured more than once",
                    output.plane_id
                )));
            }
        }
        Ok(())
    }
}
