// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Flip-paced frame loop.
//!
//! Each output is either `Ready` to take a frame or `AwaitingFlip` on the
//! one frame it already handed to the stream. Rendering, swapping and
//! acquiring only ever happen for `Ready` outputs; the only thing that
//! moves an output back to `Ready` is a flip-complete event carrying its
//! token. That keeps at most one frame in flight per output, which is
//! exactly what the depth-1 stream FIFO can hold.
//!
//! All outputs share one event source and one dispatch loop on the
//! calling thread.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::config::SchedulerConfig;
use crate::core::error::{FrameError, Severity};
use crate::core::flip_event::{FlipEvent, FlipEventSource, FlipToken};
use crate::core::pipeline::Pipeline;
use crate::core::stats::FrameStats;
use crate::egl::constants::DRM_FLIP_EVENT_DATA_NV;
use crate::egl::{Attrib, AttribList, EglApi, SurfaceHandle};

/// Per-output flip readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipState {
    /// May render and submit the next frame.
    Ready,
    /// A frame was submitted; waiting for its flip to complete.
    AwaitingFlip,
}

/// What the renderer is drawing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub token: FlipToken,
    /// Frames previously rendered for this output.
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    /// Time since the scheduler was created.
    pub elapsed: Duration,
}

/// Per-frame rendering work. Called with the render context current on the
/// output's surface.
pub trait FrameRenderer {
    fn render(&mut self, frame: &FrameContext);
}

impl<F: FnMut(&FrameContext)> FrameRenderer for F {
    fn render(&mut self, frame: &FrameContext) {
        self(frame)
    }
}

/// Outcome of one [`FrameScheduler::step`].
#[derive(Debug, Default)]
pub struct StepReport {
    pub frames_presented: u64,
    pub flips_completed: usize,
    /// Recoverable failures; the loop carries on after these.
    pub errors: Vec<FrameError>,
}

struct ScheduledOutput<'a> {
    token: FlipToken,
    pipeline: &'a Pipeline,
    frames: u64,
}

pub struct FrameScheduler<'a, A: EglApi + ?Sized, E: FlipEventSource> {
    api: &'a A,
    events: E,
    outputs: Vec<ScheduledOutput<'a>>,
    states: HashMap<FlipToken, FlipState>,
    current_surface: Option<SurfaceHandle>,
    acquire_retries: u32,
    max_frames: Option<u64>,
    frames_presented: u64,
    stats: FrameStats,
    started: Instant,
}

impl<'a, A: EglApi + ?Sized, E: FlipEventSource> FrameScheduler<'a, A, E> {
    pub fn new(api: &'a A, events: E, config: &SchedulerConfig) -> Self {
        Self {
            api,
            events,
            outputs: Vec::new(),
            states: HashMap::new(),
            current_surface: None,
            acquire_retries: config.acquire_retries,
            max_frames: config.max_frames,
            frames_presented: 0,
            stats: FrameStats::new(config.stats_interval()),
            started: Instant::now(),
        }
    }

    /// Schedule frames for `pipeline`. The returned token is what its flip
    /// events will carry.
    pub fn add_output(&mut self, pipeline: &'a Pipeline) -> FlipToken {
        let token = FlipToken::new(self.outputs.len() + 1);
        self.outputs.push(ScheduledOutput {
            token,
            pipeline,
            frames: 0,
        });
        self.states.insert(token, FlipState::Ready);
        tracing::debug!(
            "Output {} -> plane {:#x}",
            token,
            pipeline.output().plane_id()
        );
        token
    }

    pub fn flip_state(&self, token: FlipToken) -> Option<FlipState> {
        self.states.get(&token).copied()
    }

    /// Whether `token` has a submitted frame whose flip hasn't completed.
    pub fn in_flight(&self, token: FlipToken) -> bool {
        self.flip_state(token) == Some(FlipState::AwaitingFlip)
    }

    /// Frames submitted and acquired across all outputs.
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    fn frame_budget_spent(&self) -> bool {
        self.max_frames
            .is_some_and(|max| self.frames_presented >= max)
    }

    fn any_ready(&self) -> bool {
        self.states.values().any(|state| *state == FlipState::Ready)
    }

    fn any_in_flight(&self) -> bool {
        self.states
            .values()
            .any(|state| *state == FlipState::AwaitingFlip)
    }

    fn complete_flip(states: &mut HashMap<FlipToken, FlipState>, event: FlipEvent) -> bool {
        match states.get_mut(&event.token) {
            Some(state) if *state == FlipState::AwaitingFlip => {
                *state = FlipState::Ready;
                tracing::trace!(
                    "Flip complete for output {} (seq {}, {:?})",
                    event.token,
                    event.sequence,
                    event.timestamp()
                );
                true
            }
            Some(_) => {
                tracing::debug!("Ignoring flip for output {}: no frame in flight", event.token);
                false
            }
            None => {
                tracing::debug!("Ignoring flip with unknown token {}", event.token);
                false
            }
        }
    }

    /// Block for one read of the event source and apply the flips in it.
    /// Returns how many outputs became ready.
    pub fn dispatch_events(&mut self) -> Result<usize, FrameError> {
        let states = &mut self.states;
        let mut completed = 0;
        self.events.dispatch(&mut |event| {
            if Self::complete_flip(states, event) {
                completed += 1;
            }
        })?;
        Ok(completed)
    }

    fn acquire(&self, pipeline: &Pipeline, token: FlipToken) -> Result<(), FrameError> {
        let attribs = AttribList::<Attrib>::new()
            .with(DRM_FLIP_EVENT_DATA_NV as Attrib, token.raw())
            .build();

        let mut attempt = 0;
        loop {
            match self.api.stream_consumer_acquire(
                pipeline.display(),
                pipeline.stream().handle(),
                &attribs,
            ) {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= self.acquire_retries => {
                    return Err(FrameError::AcquireFailed { token, source });
                }
                Err(source) => {
                    attempt += 1;
                    tracing::warn!(
                        "Acquire failed for output {} ({}), retry {}/{}",
                        token,
                        source,
                        attempt,
                        self.acquire_retries
                    );
                }
            }
        }
    }

    fn present(
        &mut self,
        index: usize,
        renderer: &mut dyn FrameRenderer,
    ) -> Result<(), FrameError> {
        let api = self.api;
        let elapsed = self.started.elapsed();
        let output = &self.outputs[index];
        let (token, pipeline) = (output.token, output.pipeline);
        let display = pipeline.display();
        let surface = pipeline.surface().handle();

        if self.current_surface != Some(surface) {
            api.make_current(display, Some(surface), Some(pipeline.context()))
                .map_err(|source| FrameError::MakeCurrentFailed { token, source })?;
            self.current_surface = Some(surface);
        }

        renderer.render(&FrameContext {
            token,
            frame_index: output.frames,
            width: pipeline.surface().width(),
            height: pipeline.surface().height(),
            elapsed,
        });
        self.outputs[index].frames += 1;

        api.swap_buffers(display, surface)
            .map_err(|source| FrameError::SwapFailed { token, source })?;

        // The frame is in the stream now; with auto-acquire off nothing
        // else will drain it, so the output waits for a flip either way.
        self.states.insert(token, FlipState::AwaitingFlip);
        self.acquire(pipeline, token)?;
        self.frames_presented += 1;
        Ok(())
    }

    /// Present one frame on every ready output, then wait for one batch of
    /// flip events.
    ///
    /// Blocks first if every output is still waiting on a flip. Once
    /// `max_frames` frames are presented no more are rendered, even for
    /// outputs later in the same step. Errors returned directly are fatal;
    /// recoverable ones are in the report.
    pub fn step(&mut self, renderer: &mut dyn FrameRenderer) -> Result<StepReport, FrameError> {
        let mut report = StepReport::default();
        if self.outputs.is_empty() {
            return Ok(report);
        }

        while !self.any_ready() {
            report.flips_completed += self.dispatch_events()?;
        }

        for index in 0..self.outputs.len() {
            if self.frame_budget_spent() {
                break;
            }
            let token = self.outputs[index].token;
            if self.states.get(&token) != Some(&FlipState::Ready) {
                continue;
            }
            match self.present(index, renderer) {
                Ok(()) => report.frames_presented += 1,
                Err(err) => report.errors.push(err),
            }
        }

        if self.any_in_flight() {
            report.flips_completed += self.dispatch_events()?;
        }

        self.stats.record(report.frames_presented, Instant::now());
        Ok(report)
    }

    /// Step until `max_frames` frames have been presented, or forever.
    /// Returns the number of frames presented.
    pub fn run(&mut self, renderer: &mut dyn FrameRenderer) -> Result<u64, FrameError> {
        if self.outputs.is_empty() {
            tracing::warn!("No outputs scheduled; nothing to present");
            return Ok(0);
        }
        tracing::info!("Frame loop started with {} output(s)", self.outputs.len());

        while !self.frame_budget_spent() {
            let report = self.step(renderer)?;
            for err in report.errors {
                match err.severity() {
                    Severity::Recoverable => tracing::error!("{}", err),
                    Severity::Fatal => return Err(err),
                }
            }
        }

        tracing::info!("Frame loop finished after {} frames", self.frames_presented);
        Ok(self.frames_presented)
    }
}
