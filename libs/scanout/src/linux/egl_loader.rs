// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `libEGL` loaded at runtime.
//!
//! Core EGL goes through the typed `khronos-egl` instance. The device,
//! output and stream extensions are resolved once through
//! `eglGetProcAddress`; a missing one only becomes an error when it is
//! called, since the capability checks decide whether it is needed.

use std::ffi::{c_char, c_void, CStr};
use std::mem;
use std::ptr;

use khronos_egl as khronos;

use crate::core::error::SetupError;
use crate::egl::constants as c;
use crate::egl::{
    Attrib, ClientApi, ConfigHandle, ContextHandle, DeviceHandle, DeviceString, DisplayHandle,
    EglApi, EglError, Int, OutputLayerHandle, StreamHandle, SurfaceHandle,
};

type Boolean = u32;
type Enum = u32;

type QueryDevicesExt = unsafe extern "system" fn(Int, *mut *mut c_void, *mut Int) -> Boolean;
type QueryDeviceStringExt = unsafe extern "system" fn(*mut c_void, Int) -> *const c_char;
type GetPlatformDisplayExt =
    unsafe extern "system" fn(Enum, *mut c_void, *const Int) -> *mut c_void;
type GetOutputLayersExt = unsafe extern "system" fn(
    *mut c_void,
    *const Attrib,
    *mut *mut c_void,
    Int,
    *mut Int,
) -> Boolean;
type CreateStreamKhr = unsafe extern "system" fn(*mut c_void, *const Int) -> *mut c_void;
type DestroyStreamKhr = unsafe extern "system" fn(*mut c_void, *mut c_void) -> Boolean;
type StreamConsumerOutputExt =
    unsafe extern "system" fn(*mut c_void, *mut c_void, *mut c_void) -> Boolean;
type CreateStreamProducerSurfaceKhr =
    unsafe extern "system" fn(*mut c_void, *mut c_void, *mut c_void, *const Int) -> *mut c_void;
type QueryStreamKhr =
    unsafe extern "system" fn(*mut c_void, *mut c_void, Enum, *mut Int) -> Boolean;
type StreamConsumerAcquireAttribNv =
    unsafe extern "system" fn(*mut c_void, *mut c_void, *const Attrib) -> Boolean;
type GetError = unsafe extern "system" fn() -> Int;

/// Resolve an entry point into the field's function-pointer type.
macro_rules! resolve {
    ($egl:expr, $name:literal) => {
        $egl.get_proc_address($name).map(|f| {
            // SAFETY: the pointer was returned for `$name`, whose
            // signature is the target type.
            unsafe { mem::transmute(f) }
        })
    };
}

/// Extension entry points, `None` when the driver doesn't export them.
struct ExtensionFns {
    query_devices: Option<QueryDevicesExt>,
    query_device_string: Option<QueryDeviceStringExt>,
    get_platform_display: Option<GetPlatformDisplayExt>,
    get_output_layers: Option<GetOutputLayersExt>,
    create_stream: Option<CreateStreamKhr>,
    destroy_stream: Option<DestroyStreamKhr>,
    stream_consumer_output: Option<StreamConsumerOutputExt>,
    create_stream_producer_surface: Option<CreateStreamProducerSurfaceKhr>,
    query_stream: Option<QueryStreamKhr>,
    stream_consumer_acquire_attrib: Option<StreamConsumerAcquireAttribNv>,
    get_error: Option<GetError>,
}

impl ExtensionFns {
    fn load(egl: &khronos::DynamicInstance<khronos::EGL1_4>) -> Self {
        Self {
            query_devices: resolve!(egl, "eglQueryDevicesEXT"),
            query_device_string: resolve!(egl, "eglQueryDeviceStringEXT"),
            get_platform_display: resolve!(egl, "eglGetPlatformDisplayEXT"),
            get_output_layers: resolve!(egl, "eglGetOutputLayersEXT"),
            create_stream: resolve!(egl, "eglCreateStreamKHR"),
            destroy_stream: resolve!(egl, "eglDestroyStreamKHR"),
            stream_consumer_output: resolve!(egl, "eglStreamConsumerOutputEXT"),
            create_stream_producer_surface: resolve!(egl, "eglCreateStreamProducerSurfaceKHR"),
            query_stream: resolve!(egl, "eglQueryStreamKHR"),
            stream_consumer_acquire_attrib: resolve!(egl, "eglStreamConsumerAcquireAttribNV"),
            // khronos-egl's get_error() panics on extension error codes
            get_error: resolve!(egl, "eglGetError"),
        }
    }
}

fn entry<F: Copy>(f: Option<F>, name: &'static str) -> Result<F, EglError> {
    f.ok_or(EglError::MissingEntryPoint(name))
}

#[allow(unreachable_patterns)]
fn map_khronos_error(err: khronos::Error) -> EglError {
    match err {
        khronos::Error::NotInitialized => EglError::NotInitialized,
        khronos::Error::BadAccess => EglError::BadAccess,
        khronos::Error::BadAlloc => EglError::BadAlloc,
        khronos::Error::BadAttribute => EglError::BadAttribute,
        khronos::Error::BadContext => EglError::BadContext,
        khronos::Error::BadConfig => EglError::BadConfig,
        khronos::Error::BadCurrentSurface => EglError::BadCurrentSurface,
        khronos::Error::BadDisplay => EglError::BadDisplay,
        khronos::Error::BadSurface => EglError::BadSurface,
        khronos::Error::BadMatch => EglError::BadMatch,
        khronos::Error::BadParameter => EglError::BadParameter,
        khronos::Error::BadNativePixmap => EglError::BadNativePixmap,
        khronos::Error::BadNativeWindow => EglError::BadNativeWindow,
        khronos::Error::ContextLost => EglError::ContextLost,
        _ => EglError::Unknown(0),
    }
}

fn to_display(handle: DisplayHandle) -> khronos::Display {
    // SAFETY: handles only come from a successful eglGetPlatformDisplayEXT.
    unsafe { khronos::Display::from_ptr(handle.as_raw()) }
}

fn to_config(handle: ConfigHandle) -> khronos::Config {
    // SAFETY: handles only come from eglGetConfigs on the same display.
    unsafe { khronos::Config::from_ptr(handle.as_raw()) }
}

fn to_context(handle: ContextHandle) -> khronos::Context {
    // SAFETY: handles only come from a successful eglCreateContext.
    unsafe { khronos::Context::from_ptr(handle.as_raw()) }
}

fn to_surface(handle: SurfaceHandle) -> khronos::Surface {
    // SAFETY: handles only come from a successful surface creation.
    unsafe { khronos::Surface::from_ptr(handle.as_raw()) }
}

fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: EGL returns NUL-terminated strings that live as long as the
    // display or device.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// [`EglApi`] over the system `libEGL`.
pub struct KhronosEgl {
    egl: khronos::DynamicInstance<khronos::EGL1_4>,
    ext: ExtensionFns,
}

impl KhronosEgl {
    /// Load `libEGL.so.1` and resolve the extension entry points.
    pub fn load() -> Result<Self, SetupError> {
        // SAFETY: loading libEGL runs its initialisers; nothing else in the
        // process is calling EGL yet.
        let egl = unsafe { khronos::DynamicInstance::<khronos::EGL1_4>::load_required() }
            .map_err(|err| SetupError::LoadFailed(err.to_string()))?;
        let ext = ExtensionFns::load(&egl);
        tracing::debug!("Loaded libEGL");
        Ok(Self { egl, ext })
    }

    /// Look up any EGL or client API symbol, e.g. for `gl::load_with`.
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.egl
            .get_proc_address(name)
            .map_or(ptr::null(), |f| f as *const c_void)
    }

    fn last_error(&self) -> EglError {
        match self.ext.get_error {
            Some(get_error) => {
                // SAFETY: eglGetError has no preconditions.
                let code = unsafe { get_error() };
                EglError::from_code(code).unwrap_or(EglError::Unknown(code))
            }
            None => self
                .egl
                .get_error()
                .map_or(EglError::Unknown(c::SUCCESS), map_khronos_error),
        }
    }

    fn check(&self, ok: Boolean) -> Result<(), EglError> {
        if ok == 0 {
            return Err(self.last_error());
        }
        Ok(())
    }
}

impl EglApi for KhronosEgl {
    fn client_extensions(&self) -> Option<String> {
        // Fails with EGL_BAD_DISPLAY when client extensions aren't supported.
        self.egl
            .query_string(None, khronos::EXTENSIONS)
            .ok()
            .map(|s| s.to_string_lossy().into_owned())
    }

    fn device_count(&self) -> Result<usize, EglError> {
        let query = entry(self.ext.query_devices, "eglQueryDevicesEXT")?;
        let mut count: Int = 0;
        // SAFETY: a null device array with max 0 only reports the count.
        let ok = unsafe { query(0, ptr::null_mut(), &mut count) };
        self.check(ok)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn enumerate_devices(&self, max: usize) -> Result<Vec<DeviceHandle>, EglError> {
        let query = entry(self.ext.query_devices, "eglQueryDevicesEXT")?;
        let mut raw = vec![ptr::null_mut::<c_void>(); max];
        let mut count: Int = 0;
        let max = Int::try_from(max).map_err(|_| EglError::BadParameter)?;
        // SAFETY: `raw` has room for `max` handles.
        let ok = unsafe { query(max, raw.as_mut_ptr(), &mut count) };
        self.check(ok)?;
        raw.truncate(usize::try_from(count).unwrap_or(0));
        Ok(raw.into_iter().filter_map(DeviceHandle::from_raw).collect())
    }

    fn device_string(&self, device: DeviceHandle, name: DeviceString) -> Option<String> {
        let query = self.ext.query_device_string?;
        // SAFETY: `device` came from eglQueryDevicesEXT.
        owned_string(unsafe { query(device.as_raw(), name.raw()) })
    }

    fn platform_display(
        &self,
        device: DeviceHandle,
        attribs: &[Int],
    ) -> Result<DisplayHandle, EglError> {
        let get = entry(self.ext.get_platform_display, "eglGetPlatformDisplayEXT")?;
        // SAFETY: `attribs` is EGL_NONE terminated.
        let display = unsafe {
            get(
                c::PLATFORM_DEVICE_EXT as Enum,
                device.as_raw(),
                attribs.as_ptr(),
            )
        };
        DisplayHandle::from_raw(display).ok_or_else(|| self.last_error())
    }

    fn initialize(&self, display: DisplayHandle) -> Result<(Int, Int), EglError> {
        self.egl
            .initialize(to_display(display))
            .map_err(map_khronos_error)
    }

    fn display_extensions(&self, display: DisplayHandle) -> Option<String> {
        self.egl
            .query_string(Some(to_display(display)), khronos::EXTENSIONS)
            .ok()
            .map(|s| s.to_string_lossy().into_owned())
    }

    fn bind_api(&self, api: ClientApi) -> Result<(), EglError> {
        self.egl
            .bind_api(api.raw() as khronos::Enum)
            .map_err(map_khronos_error)
    }

    fn configs(&self, display: DisplayHandle) -> Result<Vec<ConfigHandle>, EglError> {
        let display = to_display(display);
        let count = self
            .egl
            .get_config_count(display)
            .map_err(map_khronos_error)?;
        let mut configs = Vec::with_capacity(count);
        self.egl
            .get_configs(display, &mut configs)
            .map_err(map_khronos_error)?;
        Ok(configs
            .into_iter()
            .filter_map(|config| ConfigHandle::from_raw(config.as_ptr()))
            .collect())
    }

    fn config_attrib(
        &self,
        display: DisplayHandle,
        config: ConfigHandle,
        attrib: Int,
    ) -> Result<Int, EglError> {
        self.egl
            .get_config_attrib(to_display(display), to_config(config), attrib)
            .map_err(map_khronos_error)
    }

    fn create_context(
        &self,
        display: DisplayHandle,
        config: ConfigHandle,
        attribs: &[Int],
    ) -> Result<ContextHandle, EglError> {
        let context = self
            .egl
            .create_context(to_display(display), to_config(config), None, attribs)
            .map_err(map_khronos_error)?;
        ContextHandle::from_raw(context.as_ptr()).ok_or(EglError::BadContext)
    }

    fn destroy_context(
        &self,
        display: DisplayHandle,
        context: ContextHandle,
    ) -> Result<(), EglError> {
        self.egl
            .destroy_context(to_display(display), to_context(context))
            .map_err(map_khronos_error)
    }

    fn output_layers(
        &self,
        display: DisplayHandle,
        attribs: &[Attrib],
    ) -> Result<Vec<OutputLayerHandle>, EglError> {
        let get = entry(self.ext.get_output_layers, "eglGetOutputLayersEXT")?;
        let mut layers = [ptr::null_mut::<c_void>(); 8];
        let mut count: Int = 0;
        // SAFETY: `layers` has room for the max we pass; `attribs` is
        // EGL_NONE terminated.
        let ok = unsafe {
            get(
                display.as_raw(),
                attribs.as_ptr(),
                layers.as_mut_ptr(),
                layers.len() as Int,
                &mut count,
            )
        };
        self.check(ok)?;
        let count = usize::try_from(count).unwrap_or(0).min(layers.len());
        Ok(layers[..count]
            .iter()
            .copied()
            .filter_map(OutputLayerHandle::from_raw)
            .collect())
    }

    fn create_stream(
        &self,
        display: DisplayHandle,
        attribs: &[Int],
    ) -> Result<StreamHandle, EglError> {
        let create = entry(self.ext.create_stream, "eglCreateStreamKHR")?;
        // SAFETY: `attribs` is EGL_NONE terminated.
        let stream = unsafe { create(display.as_raw(), attribs.as_ptr()) };
        StreamHandle::from_raw(stream).ok_or_else(|| self.last_error())
    }

    fn destroy_stream(&self, display: DisplayHandle, stream: StreamHandle) -> Result<(), EglError> {
        let destroy = entry(self.ext.destroy_stream, "eglDestroyStreamKHR")?;
        // SAFETY: `stream` came from eglCreateStreamKHR on `display`.
        let ok = unsafe { destroy(display.as_raw(), stream.as_raw()) };
        self.check(ok)
    }

    fn stream_consumer_output(
        &self,
        display: DisplayHandle,
        stream: StreamHandle,
        layer: OutputLayerHandle,
    ) -> Result<(), EglError> {
        let bind = entry(self.ext.stream_consumer_output, "eglStreamConsumerOutputEXT")?;
        // SAFETY: all three handles belong to `display`.
        let ok = unsafe { bind(display.as_raw(), stream.as_raw(), layer.as_raw()) };
        self.check(ok)
    }

    fn create_stream_producer_surface(
        &self,
        display: DisplayHandle,
        config: ConfigHandle,
        stream: StreamHandle,
        attribs: &[Int],
    ) -> Result<SurfaceHandle, EglError> {
        let create = entry(
            self.ext.create_stream_producer_surface,
            "eglCreateStreamProducerSurfaceKHR",
        )?;
        // SAFETY: handles belong to `display`; `attribs` is EGL_NONE terminated.
        let surface = unsafe {
            create(
                display.as_raw(),
                config.as_raw(),
                stream.as_raw(),
                attribs.as_ptr(),
            )
        };
        SurfaceHandle::from_raw(surface).ok_or_else(|| self.last_error())
    }

    fn destroy_surface(
        &self,
        display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(), EglError> {
        self.egl
            .destroy_surface(to_display(display), to_surface(surface))
            .map_err(map_khronos_error)
    }

    fn make_current(
        &self,
        display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> Result<(), EglError> {
        let surface = surface.map(to_surface);
        self.egl
            .make_current(to_display(display), surface, surface, context.map(to_context))
            .map_err(map_khronos_error)
    }

    fn query_stream(
        &self,
        display: DisplayHandle,
        stream: StreamHandle,
        attrib: Int,
    ) -> Result<Int, EglError> {
        let query = entry(self.ext.query_stream, "eglQueryStreamKHR")?;
        let mut value: Int = 0;
        // SAFETY: `stream` belongs to `display`; `value` is a valid out pointer.
        let ok = unsafe { query(display.as_raw(), stream.as_raw(), attrib as Enum, &mut value) };
        self.check(ok)?;
        Ok(value)
    }

    fn swap_buffers(&self, display: DisplayHandle, surface: SurfaceHandle) -> Result<(), EglError> {
        self.egl
            .swap_buffers(to_display(display), to_surface(surface))
            .map_err(map_khronos_error)
    }

    fn stream_consumer_acquire(
        &self,
        display: DisplayHandle,
        stream: StreamHandle,
        attribs: &[Attrib],
    ) -> Result<(), EglError> {
        let acquire = entry(
            self.ext.stream_consumer_acquire_attrib,
            "eglStreamConsumerAcquireAttribNV",
        )?;
        // SAFETY: `stream` belongs to `display`; `attribs` is EGL_NONE terminated.
        let ok = unsafe { acquire(display.as_raw(), stream.as_raw(), attribs.as_ptr()) };
        self.check(ok)
    }
}
