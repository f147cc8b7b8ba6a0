// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Capability (extension) token sets.
//!
//! EGL reports optional features as a space-delimited token string. The
//! string is parsed once into a set; a missing token is an ordinary
//! answer, and only [`CapabilitySet::require`] turns it into an error.

use std::collections::HashSet;
use std::fmt;

use crate::core::error::SetupError;

/// Extension names the pipeline checks for.
pub mod names {
    pub const DEVICE_BASE: &str = "EGL_EXT_device_base";
    pub const DEVICE_ENUMERATION: &str = "EGL_EXT_device_enumeration";
    pub const DEVICE_QUERY: &str = "EGL_EXT_device_query";
    pub const DEVICE_DRM: &str = "EGL_EXT_device_drm";
    pub const PLATFORM_BASE: &str = "EGL_EXT_platform_base";
    pub const PLATFORM_DEVICE: &str = "EGL_EXT_platform_device";
    pub const OUTPUT_BASE: &str = "EGL_EXT_output_base";
    pub const OUTPUT_DRM: &str = "EGL_EXT_output_drm";
    pub const STREAM: &str = "EGL_KHR_stream";
    pub const STREAM_CONSUMER_EGLOUTPUT: &str = "EGL_EXT_stream_consumer_egloutput";
    pub const STREAM_PRODUCER_EGLSURFACE: &str = "EGL_KHR_stream_producer_eglsurface";
    pub const STREAM_ACQUIRE_MODE: &str = "EGL_EXT_stream_acquire_mode";
    pub const OUTPUT_DRM_FLIP_EVENT: &str = "EGL_NV_output_drm_flip_event";
}

/// Where a capability string was queried from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityScope {
    /// `eglQueryString(EGL_NO_DISPLAY, ...)`
    Client,
    /// `eglQueryDeviceStringEXT(device, ...)`
    Device,
    /// `eglQueryString(display, ...)`
    Display,
}

impl fmt::Display for CapabilityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Client => "client",
            Self::Device => "device",
            Self::Display => "display",
        })
    }
}

/// Parsed capability tokens for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    scope: CapabilityScope,
    tokens: HashSet<String>,
}

impl CapabilitySet {
    pub fn parse(scope: CapabilityScope, raw: &str) -> Self {
        Self {
            scope,
            tokens: raw.split_ascii_whitespace().map(str::to_owned).collect(),
        }
    }

    /// A scope whose string could not be queried at all behaves as empty.
    pub fn from_query(scope: CapabilityScope, raw: Option<&str>) -> Self {
        Self::parse(scope, raw.unwrap_or_default())
    }

    pub fn scope(&self) -> CapabilityScope {
        self.scope
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tokens.contains(name)
    }

    /// Error with [`SetupError::MissingCapability`] when `name` is absent.
    pub fn require(&self, name: &'static str) -> Result<(), SetupError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(SetupError::MissingCapability {
                scope: self.scope,
                name,
            })
        }
    }

    /// Require each name in order; the first missing one is reported.
    pub fn require_all(&self, names: &[&'static str]) -> Result<(), SetupError> {
        names.iter().try_for_each(|name| self.require(*name))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
