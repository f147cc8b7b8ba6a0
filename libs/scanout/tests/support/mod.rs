// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scripted EGL driver and flip-event source shared by the integration
//! tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::rc::Rc;

use scanout::egl::constants as c;
use scanout::egl::{
    attrib_value, Attrib, ClientApi, ConfigHandle, ContextHandle, DeviceHandle, DeviceString,
    DisplayHandle, EglApi, EglError, Int, OutputLayerHandle, StreamHandle, SurfaceHandle,
};
use scanout::{names, ConfigDescriptor, FlipEvent, FlipEventSource, FlipToken, FrameError};

pub const CLIENT_EXTENSIONS: &str =
    "EGL_EXT_device_base EGL_EXT_platform_base EGL_EXT_platform_device";

pub const DISPLAY_EXTENSIONS: &[&str] = &[
    names::OUTPUT_BASE,
    names::OUTPUT_DRM,
    names::STREAM,
    names::STREAM_CONSUMER_EGLOUTPUT,
    names::STREAM_PRODUCER_EGLSURFACE,
    names::STREAM_ACQUIRE_MODE,
    names::OUTPUT_DRM_FLIP_EVENT,
];

pub const DRM_DEVICE_EXTENSIONS: &str = "EGL_EXT_device_base EGL_EXT_device_drm";

const DISPLAY_ADDR: usize = 0xd150;
const DEVICE_BASE_ADDR: usize = 0x1000;
const CONFIG_BASE_ADDR: usize = 0x2000;
const LAYER_BASE_ADDR: usize = 0x3000;

/// One EGL entry point, for ordering assertions and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ClientExtensions,
    DeviceCount,
    EnumerateDevices,
    DeviceString,
    PlatformDisplay,
    Initialize,
    DisplayExtensions,
    BindApi,
    Configs,
    ConfigAttrib,
    CreateContext,
    DestroyContext,
    OutputLayers,
    CreateStream,
    DestroyStream,
    StreamConsumerOutput,
    CreateProducerSurface,
    DestroySurface,
    MakeCurrent,
    QueryStream,
    SwapBuffers,
    Acquire,
}

/// A recorded call with the arguments tests care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ClientExtensions,
    DeviceCount,
    EnumerateDevices { max: usize },
    DeviceString { device: DeviceHandle, name: DeviceString },
    PlatformDisplay { device: DeviceHandle, attribs: Vec<Int> },
    Initialize,
    DisplayExtensions,
    BindApi(ClientApi),
    Configs,
    ConfigAttrib { config: ConfigHandle, attrib: Int },
    CreateContext { config: ConfigHandle, attribs: Vec<Int> },
    DestroyContext(ContextHandle),
    OutputLayers { attribs: Vec<Attrib> },
    CreateStream { attribs: Vec<Int> },
    DestroyStream(StreamHandle),
    StreamConsumerOutput { stream: StreamHandle, layer: OutputLayerHandle },
    CreateProducerSurface { config: ConfigHandle, stream: StreamHandle, attribs: Vec<Int> },
    DestroySurface(SurfaceHandle),
    MakeCurrent { surface: Option<SurfaceHandle>, context: Option<ContextHandle> },
    QueryStream { stream: StreamHandle, attrib: Int },
    SwapBuffers(SurfaceHandle),
    Acquire { stream: StreamHandle, attribs: Vec<Attrib> },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Self::ClientExtensions => Op::ClientExtensions,
            Self::DeviceCount => Op::DeviceCount,
            Self::EnumerateDevices { .. } => Op::EnumerateDevices,
            Self::DeviceString { .. } => Op::DeviceString,
            Self::PlatformDisplay { .. } => Op::PlatformDisplay,
            Self::Initialize => Op::Initialize,
            Self::DisplayExtensions => Op::DisplayExtensions,
            Self::BindApi(_) => Op::BindApi,
            Self::Configs => Op::Configs,
            Self::ConfigAttrib { .. } => Op::ConfigAttrib,
            Self::CreateContext { .. } => Op::CreateContext,
            Self::DestroyContext(_) => Op::DestroyContext,
            Self::OutputLayers { .. } => Op::OutputLayers,
            Self::CreateStream { .. } => Op::CreateStream,
            Self::DestroyStream(_) => Op::DestroyStream,
            Self::StreamConsumerOutput { .. } => Op::StreamConsumerOutput,
            Self::CreateProducerSurface { .. } => Op::CreateProducerSurface,
            Self::DestroySurface(_) => Op::DestroySurface,
            Self::MakeCurrent { .. } => Op::MakeCurrent,
            Self::QueryStream { .. } => Op::QueryStream,
            Self::SwapBuffers(_) => Op::SwapBuffers,
            Self::Acquire { .. } => Op::Acquire,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub extensions: Option<String>,
    pub drm_file: Option<String>,
}

impl FakeDevice {
    pub fn drm(path: &Path) -> Self {
        Self {
            extensions: Some(DRM_DEVICE_EXTENSIONS.to_string()),
            drm_file: Some(path.display().to_string()),
        }
    }

    pub fn software() -> Self {
        Self {
            extensions: Some("EGL_EXT_device_base EGL_MESA_device_software".to_string()),
            drm_file: None,
        }
    }
}

/// 8-bit RGB, 24-bit depth, stream and window capable, desktop GL + GLES.
pub fn stream_config() -> ConfigDescriptor {
    ConfigDescriptor {
        red_size: 8,
        green_size: 8,
        blue_size: 8,
        alpha_size: 0,
        depth_size: 24,
        surface_type: c::STREAM_BIT_KHR | 0x0004,
        renderable_type: c::OPENGL_BIT | 0x0040,
    }
}

/// Window-only config: no stream bit.
pub fn window_config() -> ConfigDescriptor {
    ConfigDescriptor {
        surface_type: 0x0004,
        ..stream_config()
    }
}

/// Stream capable but GLES only.
pub fn gles_config() -> ConfigDescriptor {
    ConfigDescriptor {
        renderable_type: 0x0040,
        ..stream_config()
    }
}

/// Stream capable but without a depth buffer.
pub fn no_depth_config() -> ConfigDescriptor {
    ConfigDescriptor {
        depth_size: 0,
        ..stream_config()
    }
}

struct Failure {
    error: EglError,
    /// `None` fails every call.
    remaining: Option<u32>,
}

#[derive(Default)]
struct FakeState {
    client_extensions: Option<String>,
    devices: Vec<FakeDevice>,
    display_extensions: Option<String>,
    configs: Vec<ConfigDescriptor>,
    /// plane id -> layer
    planes: Vec<u32>,
    failures: HashMap<Op, Failure>,
    calls: Vec<Call>,
    next_handle: usize,
    contexts: HashSet<ContextHandle>,
    streams: HashMap<StreamHandle, Int>,
    surfaces: HashMap<SurfaceHandle, StreamHandle>,
    current: Option<(SurfaceHandle, ContextHandle)>,
    /// Surfaces swapped since their last acquire.
    pending_frames: HashSet<StreamHandle>,
    /// Flip tokens acquired and not yet handed to an event source.
    armed_flips: VecDeque<FlipToken>,
}

impl FakeState {
    fn alloc(&mut self) -> usize {
        self.next_handle += 0x10;
        0x8000 + self.next_handle
    }

    fn fail(&mut self, op: Op) -> Result<(), EglError> {
        let Some(failure) = self.failures.get_mut(&op) else {
            return Ok(());
        };
        let error = failure.error;
        match &mut failure.remaining {
            None => {}
            Some(0) => return Ok(()),
            Some(n) => *n -= 1,
        }
        Err(error)
    }
}

/// A scripted EGL driver. Clones share state, so a test can keep one
/// handle for assertions while the code under test uses another.
#[derive(Clone)]
pub struct FakeEgl {
    state: Rc<RefCell<FakeState>>,
}

impl FakeEgl {
    /// No devices, no extensions.
    pub fn empty() -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::default())),
        }
    }

    /// One DRM-capable GPU whose device node is `drm_path`, advertising
    /// every extension the pipeline uses, with one stream-capable config
    /// and output layers for `planes`.
    pub fn nvidia(drm_path: &Path, planes: &[u32]) -> Self {
        let egl = Self::empty();
        {
            let mut state = egl.state.borrow_mut();
            state.client_extensions = Some(CLIENT_EXTENSIONS.to_string());
            state.devices = vec![FakeDevice::drm(drm_path)];
            state.display_extensions = Some(DISPLAY_EXTENSIONS.join(" "));
            state.configs = vec![stream_config()];
            state.planes = planes.to_vec();
        }
        egl
    }

    pub fn set_client_extensions(&self, extensions: Option<&str>) {
        self.state.borrow_mut().client_extensions = extensions.map(str::to_owned);
    }

    pub fn set_devices(&self, devices: Vec<FakeDevice>) {
        self.state.borrow_mut().devices = devices;
    }

    pub fn set_display_extensions(&self, extensions: &[&str]) {
        self.state.borrow_mut().display_extensions = Some(extensions.join(" "));
    }

    /// Drop one token from the display extension string.
    pub fn remove_display_extension(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        let remaining: Vec<String> = state
            .display_extensions
            .as_deref()
            .unwrap_or_default()
            .split_ascii_whitespace()
            .filter(|token| *token != name)
            .map(str::to_owned)
            .collect();
        state.display_extensions = Some(remaining.join(" "));
    }

    pub fn set_configs(&self, configs: Vec<ConfigDescriptor>) {
        self.state.borrow_mut().configs = configs;
    }

    pub fn set_planes(&self, planes: &[u32]) {
        self.state.borrow_mut().planes = planes.to_vec();
    }

    /// Fail every call to `op` with `error`.
    pub fn fail(&self, op: Op, error: EglError) {
        self.state.borrow_mut().failures.insert(
            op,
            Failure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` calls to `op`, then succeed.
    pub fn fail_times(&self, op: Op, error: EglError, times: u32) {
        self.state.borrow_mut().failures.insert(
            op,
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.borrow().calls.iter().map(Call::op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    pub fn called(&self, op: Op) -> bool {
        self.count(op) > 0
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn device_handle(index: usize) -> DeviceHandle {
        DeviceHandle::from_addr(DEVICE_BASE_ADDR + index * 0x10).unwrap()
    }

    pub fn config_handle(index: usize) -> ConfigHandle {
        ConfigHandle::from_addr(CONFIG_BASE_ADDR + index * 0x10).unwrap()
    }

    pub fn layer_handle(index: usize) -> OutputLayerHandle {
        OutputLayerHandle::from_addr(LAYER_BASE_ADDR + index * 0x10).unwrap()
    }

    /// EGL objects created and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        let state = self.state.borrow();
        state.contexts.len() + state.streams.len() + state.surfaces.len()
    }

    pub fn stream_state(&self, stream: StreamHandle) -> Option<Int> {
        self.state.borrow().streams.get(&stream).copied()
    }

    /// Flip tokens acquired since the last call.
    pub fn take_armed_flips(&self) -> Vec<FlipToken> {
        self.state.borrow_mut().armed_flips.drain(..).collect()
    }

    fn record(&self, call: Call) -> Result<(), EglError> {
        let mut state = self.state.borrow_mut();
        let op = call.op();
        state.calls.push(call);
        state.fail(op)
    }
}

fn device_index(device: DeviceHandle) -> usize {
    (device.addr() - DEVICE_BASE_ADDR) / 0x10
}

fn config_index(config: ConfigHandle) -> usize {
    (config.addr() - CONFIG_BASE_ADDR) / 0x10
}

impl EglApi for FakeEgl {
    fn client_extensions(&self) -> Option<String> {
        self.state.borrow_mut().calls.push(Call::ClientExtensions);
        self.state.borrow().client_extensions.clone()
    }

    fn device_count(&self) -> Result<usize, EglError> {
        self.record(Call::DeviceCount)?;
        Ok(self.state.borrow().devices.len())
    }

    fn enumerate_devices(&self, max: usize) -> Result<Vec<DeviceHandle>, EglError> {
        self.record(Call::EnumerateDevices { max })?;
        let count = self.state.borrow().devices.len().min(max);
        Ok((0..count).map(Self::device_handle).collect())
    }

    fn device_string(&self, device: DeviceHandle, name: DeviceString) -> Option<String> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::DeviceString { device, name });
        let state = self.state.borrow();
        let fake = state.devices.get(device_index(device))?;
        match name {
            DeviceString::Extensions => fake.extensions.clone(),
            DeviceString::DrmDeviceFile => fake.drm_file.clone(),
        }
    }

    fn platform_display(
        &self,
        device: DeviceHandle,
        attribs: &[Int],
    ) -> Result<DisplayHandle, EglError> {
        self.record(Call::PlatformDisplay {
            device,
            attribs: attribs.to_vec(),
        })?;
        Ok(DisplayHandle::from_addr(DISPLAY_ADDR).unwrap())
    }

    fn initialize(&self, _display: DisplayHandle) -> Result<(Int, Int), EglError> {
        self.record(Call::Initialize)?;
        Ok((1, 5))
    }

    fn display_extensions(&self, _display: DisplayHandle) -> Option<String> {
        self.state.borrow_mut().calls.push(Call::DisplayExtensions);
        self.state.borrow().display_extensions.clone()
    }

    fn bind_api(&self, api: ClientApi) -> Result<(), EglError> {
        self.record(Call::BindApi(api))
    }

    fn configs(&self, _display: DisplayHandle) -> Result<Vec<ConfigHandle>, EglError> {
        self.record(Call::Configs)?;
        let count = self.state.borrow().configs.len();
        Ok((0..count).map(Self::config_handle).collect())
    }

    fn config_attrib(
        &self,
        _display: DisplayHandle,
        config: ConfigHandle,
        attrib: Int,
    ) -> Result<Int, EglError> {
        self.record(Call::ConfigAttrib { config, attrib })?;
        let state = self.state.borrow();
        let descriptor = state
            .configs
            .get(config_index(config))
            .ok_or(EglError::BadConfig)?;
        match attrib {
            c::RED_SIZE => Ok(descriptor.red_size),
            c::GREEN_SIZE => Ok(descriptor.green_size),
            c::BLUE_SIZE => Ok(descriptor.blue_size),
            c::ALPHA_SIZE => Ok(descriptor.alpha_size),
            c::DEPTH_SIZE => Ok(descriptor.depth_size),
            c::SURFACE_TYPE => Ok(descriptor.surface_type),
            c::RENDERABLE_TYPE => Ok(descriptor.renderable_type),
            _ => Err(EglError::BadAttribute),
        }
    }

    fn create_context(
        &self,
        _display: DisplayHandle,
        config: ConfigHandle,
        attribs: &[Int],
    ) -> Result<ContextHandle, EglError> {
        self.record(Call::CreateContext {
            config,
            attribs: attribs.to_vec(),
        })?;
        let mut state = self.state.borrow_mut();
        let context = ContextHandle::from_addr(state.alloc()).unwrap();
        state.contexts.insert(context);
        Ok(context)
    }

    fn destroy_context(
        &self,
        _display: DisplayHandle,
        context: ContextHandle,
    ) -> Result<(), EglError> {
        self.record(Call::DestroyContext(context))?;
        if self.state.borrow_mut().contexts.remove(&context) {
            Ok(())
        } else {
            Err(EglError::BadContext)
        }
    }

    fn output_layers(
        &self,
        _display: DisplayHandle,
        attribs: &[Attrib],
    ) -> Result<Vec<OutputLayerHandle>, EglError> {
        self.record(Call::OutputLayers {
            attribs: attribs.to_vec(),
        })?;
        let plane = attrib_value(attribs, c::DRM_PLANE_EXT as Attrib);
        let state = self.state.borrow();
        Ok(state
            .planes
            .iter()
            .enumerate()
            .filter(|(_, id)| plane.is_none_or(|plane| plane == **id as Attrib))
            .map(|(index, _)| Self::layer_handle(index))
            .collect())
    }

    fn create_stream(
        &self,
        _display: DisplayHandle,
        attribs: &[Int],
    ) -> Result<StreamHandle, EglError> {
        self.record(Call::CreateStream {
            attribs: attribs.to_vec(),
        })?;
        let mut state = self.state.borrow_mut();
        let stream = StreamHandle::from_addr(state.alloc()).unwrap();
        state.streams.insert(stream, c::STREAM_STATE_CREATED_KHR);
        Ok(stream)
    }

    fn destroy_stream(&self, _display: DisplayHandle, stream: StreamHandle) -> Result<(), EglError> {
        self.record(Call::DestroyStream(stream))?;
        match self.state.borrow_mut().streams.remove(&stream) {
            Some(_) => Ok(()),
            None => Err(EglError::BadStream),
        }
    }

    fn stream_consumer_output(
        &self,
        _display: DisplayHandle,
        stream: StreamHandle,
        layer: OutputLayerHandle,
    ) -> Result<(), EglError> {
        self.record(Call::StreamConsumerOutput { stream, layer })?;
        let mut state = self.state.borrow_mut();
        match state.streams.get_mut(&stream) {
            Some(raw) if *raw == c::STREAM_STATE_CREATED_KHR => {
                *raw = c::STREAM_STATE_CONNECTING_KHR;
                Ok(())
            }
            Some(_) => Err(EglError::BadState),
            None => Err(EglError::BadStream),
        }
    }

    fn create_stream_producer_surface(
        &self,
        _display: DisplayHandle,
        config: ConfigHandle,
        stream: StreamHandle,
        attribs: &[Int],
    ) -> Result<SurfaceHandle, EglError> {
        self.record(Call::CreateProducerSurface {
            config,
            stream,
            attribs: attribs.to_vec(),
        })?;
        let mut state = self.state.borrow_mut();
        if !state.streams.contains_key(&stream) {
            return Err(EglError::BadStream);
        }
        let surface = SurfaceHandle::from_addr(state.alloc()).unwrap();
        state.surfaces.insert(surface, stream);
        Ok(surface)
    }

    fn destroy_surface(
        &self,
        _display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(), EglError> {
        self.record(Call::DestroySurface(surface))?;
        match self.state.borrow_mut().surfaces.remove(&surface) {
            Some(_) => Ok(()),
            None => Err(EglError::BadSurface),
        }
    }

    fn make_current(
        &self,
        _display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> Result<(), EglError> {
        self.record(Call::MakeCurrent { surface, context })?;
        let mut state = self.state.borrow_mut();
        state.current = match (surface, context) {
            (Some(surface), Some(context)) => Some((surface, context)),
            (None, None) => None,
            _ => return Err(EglError::BadMatch),
        };
        Ok(())
    }

    fn query_stream(
        &self,
        _display: DisplayHandle,
        stream: StreamHandle,
        attrib: Int,
    ) -> Result<Int, EglError> {
        self.record(Call::QueryStream { stream, attrib })?;
        let state = self.state.borrow();
        match (attrib, state.streams.get(&stream)) {
            (c::STREAM_STATE_KHR, Some(raw)) => Ok(*raw),
            (c::STREAM_STATE_KHR, None) => Err(EglError::BadStream),
            _ => Err(EglError::BadAttribute),
        }
    }

    fn swap_buffers(&self, _display: DisplayHandle, surface: SurfaceHandle) -> Result<(), EglError> {
        self.record(Call::SwapBuffers(surface))?;
        let mut state = self.state.borrow_mut();
        if state.current.map(|(current, _)| current) != Some(surface) {
            return Err(EglError::BadSurface);
        }
        let stream = *state.surfaces.get(&surface).ok_or(EglError::BadSurface)?;
        state.pending_frames.insert(stream);
        if let Some(raw) = state.streams.get_mut(&stream) {
            *raw = c::STREAM_STATE_NEW_FRAME_AVAILABLE_KHR;
        }
        Ok(())
    }

    fn stream_consumer_acquire(
        &self,
        _display: DisplayHandle,
        stream: StreamHandle,
        attribs: &[Attrib],
    ) -> Result<(), EglError> {
        self.record(Call::Acquire {
            stream,
            attribs: attribs.to_vec(),
        })?;
        let mut state = self.state.borrow_mut();
        if !state.pending_frames.remove(&stream) {
            return Err(EglError::BadState);
        }
        if let Some(raw) = state.streams.get_mut(&stream) {
            *raw = c::STREAM_STATE_OLD_FRAME_AVAILABLE_KHR;
        }
        if let Some(token) = attrib_value(attribs, c::DRM_FLIP_EVENT_DATA_NV as Attrib) {
            state.armed_flips.push_back(FlipToken::new(token));
        }
        Ok(())
    }
}

/// Route library logs to the test harness. Honours `RUST_LOG`; safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scanout=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Build a flip-complete event for `token`.
pub fn flip(token: usize, sequence: u32) -> FlipEvent {
    FlipEvent {
        token: FlipToken::new(token),
        sequence,
        tv_sec: sequence / 60,
        tv_usec: (sequence % 60) * 16_666,
        crtc_id: 0x2a,
    }
}

enum Mode {
    /// Deliver queued batches, one per dispatch.
    Scripted,
    /// Complete every flip the fake driver has armed, like a display that
    /// always flips on the next vblank.
    Hardware(FakeEgl),
}

/// Scripted flip-event source. Running dry is reported as a fatal
/// event-source error so a stalled loop fails the test instead of
/// hanging it.
pub struct FakeFlipEvents {
    mode: Mode,
    batches: VecDeque<Vec<FlipEvent>>,
    sequence: u32,
    dispatches: usize,
}

impl FakeFlipEvents {
    pub fn scripted() -> Self {
        Self {
            mode: Mode::Scripted,
            batches: VecDeque::new(),
            sequence: 0,
            dispatches: 0,
        }
    }

    pub fn hardware(egl: &FakeEgl) -> Self {
        Self {
            mode: Mode::Hardware(egl.clone()),
            ..Self::scripted()
        }
    }

    /// Queue one read's worth of events. Takes priority over armed flips.
    pub fn push_batch(&mut self, events: Vec<FlipEvent>) {
        self.batches.push_back(events);
    }

    pub fn dispatches(&self) -> usize {
        self.dispatches
    }

    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }
}

impl FlipEventSource for FakeFlipEvents {
    fn dispatch(&mut self, handler: &mut dyn FnMut(FlipEvent)) -> Result<usize, FrameError> {
        self.dispatches += 1;
        let batch = match self.batches.pop_front() {
            Some(batch) => batch,
            None => {
                let armed = match &self.mode {
                    Mode::Hardware(egl) => egl.take_armed_flips(),
                    Mode::Scripted => Vec::new(),
                };
                if armed.is_empty() {
                    return Err(FrameError::EventSource(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "no flip events scripted",
                    )));
                }
                armed
                    .into_iter()
                    .map(|token| {
                        self.sequence += 1;
                        flip(token.raw(), self.sequence)
                    })
                    .collect()
            }
        };

        let delivered = batch.len();
        batch.into_iter().for_each(|event| handler(event));
        Ok(delivered)
    }
}
