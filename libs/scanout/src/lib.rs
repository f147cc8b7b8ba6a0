// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGLStream presentation to DRM/KMS planes.
//!
//! Setup runs once, leaf first:
//!
//! ```text
//! select_device ─▶ open_display ─▶ create_render_context ─▶ build_pipeline (per plane) ─▶ FrameScheduler::run
//! ```
//!
//! Everything above the [`egl::EglApi`] seam is platform independent; the
//! Linux backends live in [`linux`].

pub mod core;
pub mod egl;
#[cfg(target_os = "linux")]
pub mod linux;

pub use crate::core::*;
pub use egl::{EglApi, EglError};
