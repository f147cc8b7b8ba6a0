// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod drm_events;
mod egl_loader;

pub use drm_events::DrmEventReader;
pub use egl_loader::KhronosEgl;
