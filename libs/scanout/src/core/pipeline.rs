// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGLStream wiring from a producer surface to a DRM plane.
//!
//! ```text
//! RenderContext ──draws──▶ ProducerSurface ──▶ Stream (FIFO 1) ──▶ OutputTarget (plane)
//! ```
//!
//! There is one [`RenderContext`] per process; every pipeline renders with
//! it and only the producer surface that is current changes.
//!
//! The stream is created with a one-frame FIFO and consumer auto-acquire
//! off: `eglSwapBuffers` only queues the frame, and the frame scheduler
//! decides when the plane latches it. That keeps exactly one frame
//! buffered and moves flip pacing out of the driver.

use crate::core::capability::names;
use crate::core::config::TargetSpec;
use crate::core::display::DisplayConnection;
use crate::core::error::SetupError;
use crate::egl::constants as c;
use crate::egl::{
    Attrib, AttribList, ClientApi, ConfigHandle, ContextHandle, DisplayHandle, EglApi, EglError,
    Int, OutputLayerHandle, StreamHandle, SurfaceHandle,
};

/// Frames the stream may hold between producer and consumer.
pub const STREAM_FIFO_LENGTH: Int = 1;

/// Display-scope extensions the stream pipeline cannot run without,
/// checked in this order.
pub const REQUIRED_DISPLAY_CAPABILITIES: [&str; 5] = [
    names::OUTPUT_BASE,
    names::OUTPUT_DRM,
    names::STREAM,
    names::STREAM_CONSUMER_EGLOUTPUT,
    names::STREAM_PRODUCER_EGLSURFACE,
];

/// Queried properties of one `EGLConfig`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub red_size: Int,
    pub green_size: Int,
    pub blue_size: Int,
    pub alpha_size: Int,
    pub depth_size: Int,
    pub surface_type: Int,
    pub renderable_type: Int,
}

impl ConfigDescriptor {
    pub fn query<A: EglApi + ?Sized>(
        api: &A,
        display: DisplayHandle,
        config: ConfigHandle,
    ) -> Result<Self, EglError> {
        let attrib = |name| api.config_attrib(display, config, name);
        Ok(Self {
            red_size: attrib(c::RED_SIZE)?,
            green_size: attrib(c::GREEN_SIZE)?,
            blue_size: attrib(c::BLUE_SIZE)?,
            alpha_size: attrib(c::ALPHA_SIZE)?,
            depth_size: attrib(c::DEPTH_SIZE)?,
            surface_type: attrib(c::SURFACE_TYPE)?,
            renderable_type: attrib(c::RENDERABLE_TYPE)?,
        })
    }
}

/// Minimum requirements a config must meet. Sizes are lower bounds and
/// the type fields are bitmasks that must all be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRequest {
    pub surface_type: Int,
    pub renderable_type: Int,
    pub min_red: Int,
    pub min_green: Int,
    pub min_blue: Int,
    pub min_alpha: Int,
    pub min_depth: Int,
}

impl ConfigRequest {
    /// Stream-producer capable, desktop-GL renderable, any colour depth,
    /// with a depth buffer.
    pub fn stream_gl() -> Self {
        Self {
            surface_type: c::STREAM_BIT_KHR,
            renderable_type: c::OPENGL_BIT,
            min_red: 1,
            min_green: 1,
            min_blue: 1,
            min_alpha: 0,
            min_depth: 1,
        }
    }

    pub fn matches(&self, config: &ConfigDescriptor) -> bool {
        config.surface_type & self.surface_type == self.surface_type
            && config.renderable_type & self.renderable_type == self.renderable_type
            && config.red_size >= self.min_red
            && config.green_size >= self.min_green
            && config.blue_size >= self.min_blue
            && config.alpha_size >= self.min_alpha
            && config.depth_size >= self.min_depth
    }
}

/// The config the context and surface were created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    handle: ConfigHandle,
    descriptor: ConfigDescriptor,
}

impl RenderConfig {
    pub fn handle(&self) -> ConfigHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &ConfigDescriptor {
        &self.descriptor
    }
}

/// First config, in driver order, that satisfies `request`.
pub fn choose_config<A: EglApi + ?Sized>(
    api: &A,
    display: DisplayHandle,
    request: &ConfigRequest,
) -> Result<RenderConfig, SetupError> {
    // A failed listing is treated like an empty one.
    let configs = api.configs(display).unwrap_or_else(|err| {
        tracing::warn!("eglGetConfigs failed: {}", err);
        Vec::new()
    });

    for handle in configs {
        match ConfigDescriptor::query(api, display, handle) {
            Ok(descriptor) if request.matches(&descriptor) => {
                return Ok(RenderConfig { handle, descriptor });
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("Skipping config {:?}: {}", handle, err),
        }
    }
    Err(SetupError::NoMatchingConfig)
}

/// A hardware scan-out plane, as an EGL output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTarget {
    layer: OutputLayerHandle,
    crtc_id: u32,
    plane_id: u32,
}

impl OutputTarget {
    pub fn layer(&self) -> OutputLayerHandle {
        self.layer
    }

    pub fn crtc_id(&self) -> u32 {
        self.crtc_id
    }

    pub fn plane_id(&self) -> u32 {
        self.plane_id
    }
}

/// Resolve the output layer for `target`'s plane.
pub fn find_output<A: EglApi + ?Sized>(
    api: &A,
    display: DisplayHandle,
    target: &TargetSpec,
) -> Result<OutputTarget, SetupError> {
    let attribs = AttribList::<Attrib>::new()
        .with(c::DRM_PLANE_EXT as Attrib, target.plane_id as Attrib)
        .build();

    let no_match = || SetupError::NoMatchingOutput {
        crtc_id: target.crtc_id,
        plane_id: target.plane_id,
    };
    let layers = api.output_layers(display, &attribs).map_err(|err| {
        tracing::debug!("eglGetOutputLayersEXT failed: {}", err);
        no_match()
    })?;

    let layer = layers.first().copied().ok_or_else(no_match)?;
    Ok(OutputTarget {
        layer,
        crtc_id: target.crtc_id,
        plane_id: target.plane_id,
    })
}

/// `EGL_STREAM_STATE_KHR` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Created,
    /// Consumer attached, waiting for a producer frame.
    Connecting,
    Empty,
    NewFrameAvailable,
    OldFrameAvailable,
    Disconnected,
}

impl StreamState {
    pub fn from_raw(raw: Int) -> Option<Self> {
        Some(match raw {
            c::STREAM_STATE_CREATED_KHR => Self::Created,
            c::STREAM_STATE_CONNECTING_KHR => Self::Connecting,
            c::STREAM_STATE_EMPTY_KHR => Self::Empty,
            c::STREAM_STATE_NEW_FRAME_AVAILABLE_KHR => Self::NewFrameAvailable,
            c::STREAM_STATE_OLD_FRAME_AVAILABLE_KHR => Self::OldFrameAvailable,
            c::STREAM_STATE_DISCONNECTED_KHR => Self::Disconnected,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    handle: StreamHandle,
}

impl Stream {
    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn fifo_length(&self) -> Int {
        STREAM_FIFO_LENGTH
    }
}

/// The EGLSurface rendering lands in; each swap feeds the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSurface {
    handle: SurfaceHandle,
    width: u32,
    height: u32,
}

impl ProducerSurface {
    pub fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// A fully wired producer-surface -> stream -> plane path.
#[derive(Debug)]
pub struct Pipeline {
    display: DisplayHandle,
    config: RenderConfig,
    context: ContextHandle,
    output: OutputTarget,
    stream: Stream,
    surface: ProducerSurface,
}

impl Pipeline {
    pub fn display(&self) -> DisplayHandle {
        self.display
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn context(&self) -> ContextHandle {
        self.context
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn surface(&self) -> &ProducerSurface {
        &self.surface
    }

    /// Current stream state, queried from the driver.
    pub fn stream_state<A: EglApi + ?Sized>(&self, api: &A) -> Result<StreamState, EglError> {
        let raw = api.query_stream(self.display, self.stream.handle, c::STREAM_STATE_KHR)?;
        StreamState::from_raw(raw).ok_or(EglError::BadState)
    }

    /// Release the context binding and destroy surface and stream. The
    /// shared context is left to [`RenderContext::destroy`]. Every step is
    /// attempted; the first failure is returned.
    pub fn teardown<A: EglApi + ?Sized>(self, api: &A) -> Result<(), EglError> {
        let display = self.display;
        let results = [
            api.make_current(display, None, None),
            api.destroy_surface(display, self.surface.handle),
            api.destroy_stream(display, self.stream.handle),
        ];
        tracing::debug!(plane = self.output.plane_id, "Pipeline torn down");
        results.into_iter().collect()
    }
}

/// Destroys whatever was created if setup bails out half way.
struct PartialPipeline<'a, A: EglApi + ?Sized> {
    api: &'a A,
    display: DisplayHandle,
    stream: Option<StreamHandle>,
    surface: Option<SurfaceHandle>,
}

impl<'a, A: EglApi + ?Sized> PartialPipeline<'a, A> {
    fn new(api: &'a A, display: DisplayHandle) -> Self {
        Self {
            api,
            display,
            stream: None,
            surface: None,
        }
    }

    fn disarm(&mut self) {
        self.stream = None;
        self.surface = None;
    }
}

impl<A: EglApi + ?Sized> Drop for PartialPipeline<'_, A> {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.take() {
            if let Err(err) = self.api.destroy_surface(self.display, surface) {
                tracing::warn!("Failed to destroy producer surface during cleanup: {}", err);
            }
        }
        if let Some(stream) = self.stream.take() {
            if let Err(err) = self.api.destroy_stream(self.display, stream) {
                tracing::warn!("Failed to destroy stream during cleanup: {}", err);
            }
        }
    }
}

/// The GL context shared by every pipeline on a display.
#[derive(Debug)]
pub struct RenderContext {
    display: DisplayHandle,
    config: RenderConfig,
    handle: ContextHandle,
}

impl RenderContext {
    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Destroy the context. Pipelines built from it must be torn down
    /// first.
    pub fn destroy<A: EglApi + ?Sized>(self, api: &A) -> Result<(), EglError> {
        api.destroy_context(self.display, self.handle)?;
        tracing::debug!("Render context destroyed");
        Ok(())
    }
}

/// Check the display can carry streams to planes, bind desktop OpenGL and
/// create the process's one render context.
pub fn create_render_context<A: EglApi + ?Sized>(
    api: &A,
    connection: &DisplayConnection,
) -> Result<RenderContext, SetupError> {
    let display = connection.handle();

    // 1. Capabilities
    connection
        .extensions()
        .require_all(&REQUIRED_DISPLAY_CAPABILITIES)?;
    for optional in [names::STREAM_ACQUIRE_MODE, names::OUTPUT_DRM_FLIP_EVENT] {
        if !connection.extensions().contains(optional) {
            tracing::warn!("{} not advertised; explicit flip pacing may not work", optional);
        }
    }

    // 2. Full OpenGL, not GLES
    api.bind_api(ClientApi::OpenGl)
        .map_err(SetupError::BindApiFailed)?;

    // 3. Config
    let config = choose_config(api, display, &ConfigRequest::stream_gl())?;
    tracing::info!("Chose EGL config {:?}: {:?}", config.handle, config.descriptor);

    // 4. Context
    let context_attribs = AttribList::<Int>::new().build();
    let handle = api
        .create_context(display, config.handle, &context_attribs)
        .map_err(SetupError::ContextCreateFailed)?;
    tracing::debug!("Created render context {:?}", handle);

    Ok(RenderContext {
        display,
        config,
        handle,
    })
}

/// Wire a producer surface of `target.width` x `target.height` to the
/// plane `target.plane_id`, and make it current with `context`.
///
/// On error nothing created here outlives the call; `context` is never
/// destroyed here.
pub fn build_pipeline<A: EglApi + ?Sized>(
    api: &A,
    connection: &DisplayConnection,
    context: &RenderContext,
    target: &TargetSpec,
) -> Result<Pipeline, SetupError> {
    let display = connection.handle();
    connection
        .extensions()
        .require_all(&REQUIRED_DISPLAY_CAPABILITIES)?;

    let mut partial = PartialPipeline::new(api, display);

    // 1. Output layer for the plane
    let output = find_output(api, display, target)?;
    tracing::debug!("Plane {:#x} -> {:?}", target.plane_id, output.layer);

    // 2. Stream: one-frame FIFO, consumer acquires only when told to
    let stream_attribs = AttribList::<Int>::new()
        .with(c::STREAM_FIFO_LENGTH_KHR, STREAM_FIFO_LENGTH)
        .with(c::CONSUMER_AUTO_ACQUIRE_EXT, c::FALSE)
        .build();
    let stream = api
        .create_stream(display, &stream_attribs)
        .map_err(SetupError::StreamCreateFailed)?;
    partial.stream = Some(stream);

    // 3. Plane consumes the stream
    api.stream_consumer_output(display, stream, output.layer)
        .map_err(SetupError::ConsumerBindFailed)?;

    // 4. Producer surface
    let surface_attribs = AttribList::<Int>::new()
        .with(c::WIDTH, target.width as Int)
        .with(c::HEIGHT, target.height as Int)
        .build();
    let surface = api
        .create_stream_producer_surface(display, context.config.handle, stream, &surface_attribs)
        .map_err(SetupError::SurfaceCreateFailed)?;
    partial.surface = Some(surface);

    // 5. Render into it
    api.make_current(display, Some(surface), Some(context.handle))
        .map_err(SetupError::MakeCurrentFailed)?;

    partial.disarm();
    tracing::info!(
        "Stream pipeline ready: {}x{} -> plane {:#x} (crtc {:#x})",
        target.width,
        target.height,
        target.plane_id,
        target.crtc_id
    );

    Ok(Pipeline {
        display,
        config: context.config,
        context: context.handle,
        output,
        stream: Stream { handle: stream },
        surface: ProducerSurface {
            handle: surface,
            width: target.width,
            height: target.height,
        },
    })
}
