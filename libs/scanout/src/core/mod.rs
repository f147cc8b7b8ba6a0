// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod capability;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod flip_event;
pub mod pipeline;
pub mod scheduler;
pub mod stats;

pub use capability::{names, CapabilityScope, CapabilitySet};
pub use config::{PresentConfig, SchedulerConfig, TargetSpec};
pub use device::{select_device, Device};
pub use display::{open_display, DisplayConnection};
pub use error::*;
pub use flip_event::{decode_events, DrmEvent, FlipEvent, FlipEventSource, FlipToken};
pub use pipeline::{
    build_pipeline, create_render_context, ConfigDescriptor, ConfigRequest, OutputTarget, Pipeline,
    ProducerSurface, RenderConfig, RenderContext, Stream, StreamState,
};
pub use scheduler::{FlipState, FrameContext, FrameRenderer, FrameScheduler, StepReport};
pub use stats::{FpsReport, FrameStats};
