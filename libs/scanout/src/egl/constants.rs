// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL enumerants used by the pipeline.
//!
//! Core values match `EGL/egl.h`; extension values come from the Khronos
//! registry. A few NVIDIA/EXT enumerants are missing from older
//! `eglext.h` revisions, so everything lives here rather than relying on
//! whichever header a binding crate was generated from.

pub type Int = i32;
pub type Attrib = usize;

pub const NONE: Int = 0x3038;
pub const EXTENSIONS: Int = 0x3055;
pub const FALSE: Int = 0;

// Error codes
pub const SUCCESS: Int = 0x3000;
pub const NOT_INITIALIZED: Int = 0x3001;
pub const BAD_ACCESS: Int = 0x3002;
pub const BAD_ALLOC: Int = 0x3003;
pub const BAD_ATTRIBUTE: Int = 0x3004;
pub const BAD_CONFIG: Int = 0x3005;
pub const BAD_CONTEXT: Int = 0x3006;
pub const BAD_CURRENT_SURFACE: Int = 0x3007;
pub const BAD_DISPLAY: Int = 0x3008;
pub const BAD_MATCH: Int = 0x3009;
pub const BAD_NATIVE_PIXMAP: Int = 0x300A;
pub const BAD_NATIVE_WINDOW: Int = 0x300B;
pub const BAD_PARAMETER: Int = 0x300C;
pub const BAD_SURFACE: Int = 0x300D;
pub const CONTEXT_LOST: Int = 0x300E;
pub const BAD_STREAM_KHR: Int = 0x321B;
pub const BAD_STATE_KHR: Int = 0x321C;
pub const BAD_DEVICE_EXT: Int = 0x322B;
pub const RESOURCE_BUSY_EXT: Int = 0x3353;

// Config attributes
pub const ALPHA_SIZE: Int = 0x3021;
pub const BLUE_SIZE: Int = 0x3022;
pub const GREEN_SIZE: Int = 0x3023;
pub const RED_SIZE: Int = 0x3024;
pub const DEPTH_SIZE: Int = 0x3025;
pub const SURFACE_TYPE: Int = 0x3033;
pub const RENDERABLE_TYPE: Int = 0x3040;
pub const OPENGL_BIT: Int = 0x0008;
pub const STREAM_BIT_KHR: Int = 0x0800;

// Surface attributes
pub const HEIGHT: Int = 0x3056;
pub const WIDTH: Int = 0x3057;

// Client APIs
pub const OPENGL_ES_API: Int = 0x30A0;
pub const OPENGL_API: Int = 0x30A2;

// EGL_EXT_device_* / EGL_EXT_platform_device
pub const DRM_DEVICE_FILE_EXT: Int = 0x3233;
pub const PLATFORM_DEVICE_EXT: Int = 0x313F;
pub const DRM_MASTER_FD_EXT: Int = 0x333C;

// EGL_EXT_output_drm
pub const DRM_PLANE_EXT: Int = 0x3235;

// EGL_KHR_stream and friends
pub const STREAM_FIFO_LENGTH_KHR: Int = 0x31FC;
pub const STREAM_STATE_KHR: Int = 0x3214;
pub const STREAM_STATE_CREATED_KHR: Int = 0x3215;
pub const STREAM_STATE_CONNECTING_KHR: Int = 0x3216;
pub const STREAM_STATE_EMPTY_KHR: Int = 0x3217;
pub const STREAM_STATE_NEW_FRAME_AVAILABLE_KHR: Int = 0x3218;
pub const STREAM_STATE_OLD_FRAME_AVAILABLE_KHR: Int = 0x3219;
pub const STREAM_STATE_DISCONNECTED_KHR: Int = 0x321A;
pub const CONSUMER_AUTO_ACQUIRE_EXT: Int = 0x332B;
pub const DRM_FLIP_EVENT_DATA_NV: Int = 0x333E;
