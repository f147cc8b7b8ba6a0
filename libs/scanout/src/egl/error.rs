// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The EGL last-error code, as a Rust error.

use thiserror::Error;

use super::constants as c;
use super::constants::Int;

/// Queried `eglGetError()` value for a failed call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EglError {
    #[error(
        "EGL is not initialized, or could not be initialized, for the specified display connection"
    )]
    NotInitialized,

    #[error("EGL cannot access a requested resource (for example a context is bound in another thread)")]
    BadAccess,

    #[error("EGL failed to allocate resources for the requested operation")]
    BadAlloc,

    #[error("an unrecognized attribute or attribute value was passed in the attribute list")]
    BadAttribute,

    #[error("an EGLContext argument does not name a valid rendering context")]
    BadContext,

    #[error("an EGLConfig argument does not name a valid frame buffer configuration")]
    BadConfig,

    #[error("the current surface of the calling thread is no longer valid")]
    BadCurrentSurface,

    #[error("an EGLDisplay argument does not name a valid display connection")]
    BadDisplay,

    #[error("an EGLSurface argument does not name a valid surface configured for GL rendering")]
    BadSurface,

    #[error("arguments are inconsistent (for example a context requires buffers the surface does not supply)")]
    BadMatch,

    #[error("one or more argument values are invalid")]
    BadParameter,

    #[error("a native pixmap argument does not refer to a valid native pixmap")]
    BadNativePixmap,

    #[error("a native window argument does not refer to a valid native window")]
    BadNativeWindow,

    #[error("a power management event occurred; contexts must be destroyed and recreated")]
    ContextLost,

    #[error("an EGL resource was busy")]
    ResourceBusy,

    #[error("EGL detected a bad state")]
    BadState,

    #[error("an EGLStream argument does not name a valid stream")]
    BadStream,

    #[error("an EGLDevice argument does not name a valid device")]
    BadDevice,

    #[error("EGL entry point {0} is not available from this driver")]
    MissingEntryPoint(&'static str),

    #[error("unknown EGL error {0:#06x}")]
    Unknown(Int),
}

impl EglError {
    /// Map a raw error code. `EGL_SUCCESS` has no error and yields `None`.
    pub fn from_code(code: Int) -> Option<Self> {
        let err = match code {
            c::SUCCESS => return None,
            c::NOT_INITIALIZED => Self::NotInitialized,
            c::BAD_ACCESS => Self::BadAccess,
            c::BAD_ALLOC => Self::BadAlloc,
            c::BAD_ATTRIBUTE => Self::BadAttribute,
            c::BAD_CONTEXT => Self::BadContext,
            c::BAD_CONFIG => Self::BadConfig,
            c::BAD_CURRENT_SURFACE => Self::BadCurrentSurface,
            c::BAD_DISPLAY => Self::BadDisplay,
            c::BAD_SURFACE => Self::BadSurface,
            c::BAD_MATCH => Self::BadMatch,
            c::BAD_PARAMETER => Self::BadParameter,
            c::BAD_NATIVE_PIXMAP => Self::BadNativePixmap,
            c::BAD_NATIVE_WINDOW => Self::BadNativeWindow,
            c::CONTEXT_LOST => Self::ContextLost,
            c::RESOURCE_BUSY_EXT => Self::ResourceBusy,
            c::BAD_STATE_KHR => Self::BadState,
            c::BAD_STREAM_KHR => Self::BadStream,
            c::BAD_DEVICE_EXT => Self::BadDevice,
            other => Self::Unknown(other),
        };
        Some(err)
    }

    /// Raw code, where one exists.
    pub fn code(&self) -> Option<Int> {
        let code = match self {
            Self::NotInitialized => c::NOT_INITIALIZED,
            Self::BadAccess => c::BAD_ACCESS,
            Self::BadAlloc => c::BAD_ALLOC,
            Self::BadAttribute => c::BAD_ATTRIBUTE,
            Self::BadContext => c::BAD_CONTEXT,
            Self::BadConfig => c::BAD_CONFIG,
            Self::BadCurrentSurface => c::BAD_CURRENT_SURFACE,
            Self::BadDisplay => c::BAD_DISPLAY,
            Self::BadSurface => c::BAD_SURFACE,
            Self::BadMatch => c::BAD_MATCH,
            Self::BadParameter => c::BAD_PARAMETER,
            Self::BadNativePixmap => c::BAD_NATIVE_PIXMAP,
            Self::BadNativeWindow => c::BAD_NATIVE_WINDOW,
            Self::ContextLost => c::CONTEXT_LOST,
            Self::ResourceBusy => c::RESOURCE_BUSY_EXT,
            Self::BadState => c::BAD_STATE_KHR,
            Self::BadStream => c::BAD_STREAM_KHR,
            Self::BadDevice => c::BAD_DEVICE_EXT,
            Self::MissingEntryPoint(_) => return None,
            Self::Unknown(code) => *code,
        };
        Some(code)
    }
}
