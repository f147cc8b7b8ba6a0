// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL platform seam.
//!
//! Every EGL call the pipeline makes goes through [`EglApi`]. The Linux
//! backend ([`crate::linux::KhronosEgl`]) forwards to the driver; tests
//! drive the pipeline against a scripted implementation instead.
//!
//! Handles are opaque and non-null by construction. The driver's
//! "no object" sentinels never cross this boundary: a failed call returns
//! the queried last-error code as an [`EglError`].

pub mod constants;
mod error;

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;

pub use constants::{Attrib, Int};
pub use error::EglError;

macro_rules! egl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Wrap a driver handle. Returns `None` for the null sentinel.
            pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
                NonZeroUsize::new(ptr as usize).map(Self)
            }

            /// Wrap an opaque handle value. Returns `None` for zero.
            pub const fn from_addr(addr: usize) -> Option<Self> {
                match NonZeroUsize::new(addr) {
                    Some(addr) => Some(Self(addr)),
                    None => None,
                }
            }

            pub fn as_raw(self) -> *mut c_void {
                self.0.get() as *mut c_void
            }

            pub fn addr(self) -> usize {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0.get())
            }
        }
    };
}

egl_handle!(
    /// `EGLDeviceEXT`: a physical GPU, enumerable without a display.
    DeviceHandle
);
egl_handle!(
    /// `EGLDisplay`.
    DisplayHandle
);
egl_handle!(
    /// `EGLConfig`.
    ConfigHandle
);
egl_handle!(
    /// `EGLContext`.
    ContextHandle
);
egl_handle!(
    /// `EGLOutputLayerEXT`: one hardware scan-out plane.
    OutputLayerHandle
);
egl_handle!(
    /// `EGLStreamKHR`.
    StreamHandle
);
egl_handle!(
    /// `EGLSurface`.
    SurfaceHandle
);

/// Client API bound with `eglBindAPI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientApi {
    /// Desktop OpenGL.
    OpenGl,
    OpenGlEs,
}

impl ClientApi {
    pub fn raw(self) -> Int {
        match self {
            Self::OpenGl => constants::OPENGL_API,
            Self::OpenGlEs => constants::OPENGL_ES_API,
        }
    }
}

/// String properties queryable on an `EGLDeviceEXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceString {
    /// Space-delimited device extension list.
    Extensions,
    /// Path of the DRM device node (`EGL_DRM_DEVICE_FILE_EXT`).
    DrmDeviceFile,
}

impl DeviceString {
    pub fn raw(self) -> Int {
        match self {
            Self::Extensions => constants::EXTENSIONS,
            Self::DrmDeviceFile => constants::DRM_DEVICE_FILE_EXT,
        }
    }
}

/// Key/value attribute list terminated by `EGL_NONE`.
///
/// EGL has two attribute widths (`EGLint` and pointer-sized `EGLAttrib`);
/// the list is generic so both are built the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttribList<T> {
    items: Vec<T>,
}

impl<T: Copy + From<u16>> AttribList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with(mut self, key: T, value: T) -> Self {
        self.items.push(key);
        self.items.push(value);
        self
    }

    /// The terminated list, ready to hand to the driver.
    pub fn build(mut self) -> Vec<T> {
        self.items.push(T::from(constants::NONE as u16));
        self.items
    }
}

impl<T: Copy + From<u16>> Default for AttribList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up `key` in a terminated attribute list.
pub fn attrib_value<T: Copy + PartialEq + From<u16>>(list: &[T], key: T) -> Option<T> {
    let none = T::from(constants::NONE as u16);
    list.chunks(2)
        .take_while(|pair| pair[0] != none)
        .find(|pair| pair.len() == 2 && pair[0] == key)
        .map(|pair| pair[1])
}

/// The EGL entry points the presentation pipeline depends on.
///
/// Core EGL 1.4 plus `EGL_EXT_device_*`, `EGL_EXT_platform_device`,
/// `EGL_EXT_output_*`, `EGL_KHR_stream*` and
/// `EGL_NV_stream_consumer_acquire`-style attribute acquisition.
/// Callers must check the matching capability before using an extension
/// entry point.
pub trait EglApi {
    /// Client extension string (`eglQueryString(EGL_NO_DISPLAY, EGL_EXTENSIONS)`).
    fn client_extensions(&self) -> Option<String>;

    /// Number of devices `eglQueryDevicesEXT` reports.
    fn device_count(&self) -> Result<usize, EglError>;

    /// Up to `max` device handles, in driver enumeration order.
    fn enumerate_devices(&self, max: usize) -> Result<Vec<DeviceHandle>, EglError>;

    fn device_string(&self, device: DeviceHandle, name: DeviceString) -> Option<String>;

    /// `eglGetPlatformDisplayEXT(EGL_PLATFORM_DEVICE_EXT, device, attribs)`.
    fn platform_display(
        &self,
        device: DeviceHandle,
        attribs: &[Int],
    ) -> Result<DisplayHandle, EglError>;

    /// Returns the EGL `(major, minor)` version.
    fn initialize(&self, display: DisplayHandle) -> Result<(Int, Int), EglError>;

    fn display_extensions(&self, display: DisplayHandle) -> Option<String>;

    fn bind_api(&self, api: ClientApi) -> Result<(), EglError>;

    /// Every config the display exposes, in driver order.
    fn configs(&self, display: DisplayHandle) -> Result<Vec<ConfigHandle>, EglError>;

    fn config_attrib(
        &self,
        display: DisplayHandle,
        config: ConfigHandle,
        attrib: Int,
    ) -> Result<Int, EglError>;

    fn create_context(
        &self,
        display: DisplayHandle,
        config: ConfigHandle,
        attribs: &[Int],
    ) -> Result<ContextHandle, EglError>;

    fn destroy_context(&self, display: DisplayHandle, context: ContextHandle)
    -> Result<(), EglError>;

    /// `eglGetOutputLayersEXT` filtered by `attribs`.
    fn output_layers(
        &self,
        display: DisplayHandle,
        attribs: &[Attrib],
    ) -> Result<Vec<OutputLayerHandle>, EglError>;

    fn create_stream(&self, display: DisplayHandle, attribs: &[Int])
    -> Result<StreamHandle, EglError>;

    fn destroy_stream(&self, display: DisplayHandle, stream: StreamHandle) -> Result<(), EglError>;

    /// Bind `layer` as the consumer of `stream`.
    fn stream_consumer_output(
        &self,
        display: DisplayHandle,
        stream: StreamHandle,
        layer: OutputLayerHandle,
    ) -> Result<(), EglError>;

    fn create_stream_producer_surface(
        &self,
        display: DisplayHandle,
        config: ConfigHandle,
        stream: StreamHandle,
        attribs: &[Int],
    ) -> Result<SurfaceHandle, EglError>;

    fn destroy_surface(&self, display: DisplayHandle, surface: SurfaceHandle)
    -> Result<(), EglError>;

    /// Bind `surface` for draw and read together with `context`; `None`
    /// for both releases the thread's current binding.
    fn make_current(
        &self,
        display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> Result<(), EglError>;

    fn query_stream(
        &self,
        display: DisplayHandle,
        stream: StreamHandle,
        attrib: Int,
    ) -> Result<Int, EglError>;

    fn swap_buffers(&self, display: DisplayHandle, surface: SurfaceHandle) -> Result<(), EglError>;

    /// Ask the consumer side to latch the next frame.
    fn stream_consumer_acquire(
        &self,
        display: DisplayHandle,
        stream: StreamHandle,
        attribs: &[Attrib],
    ) -> Result<(), EglError>;
}
