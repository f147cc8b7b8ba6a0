// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Presented-frame rate reporting.

use std::time::{Duration, Instant};

/// Frames counted over one report interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    pub frames: u64,
    pub elapsed: Duration,
}

impl FpsReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    pub fn mean_frame_time(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        // Duration divides by u32 only; larger counts saturate.
        self.elapsed / u32::try_from(self.frames).unwrap_or(u32::MAX)
    }
}

/// Counts presented frames and logs the rate once per interval.
#[derive(Debug)]
pub struct FrameStats {
    interval: Option<Duration>,
    window_start: Option<Instant>,
    frames: u64,
}

impl FrameStats {
    /// `None` disables reporting; frames are still accepted.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            window_start: None,
            frames: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Count `frames` presented at `now`. Returns the report for the
    /// interval that just closed, if one did.
    pub fn record(&mut self, frames: u64, now: Instant) -> Option<FpsReport> {
        let interval = self.interval?;
        let start = *self.window_start.get_or_insert(now);
        self.frames += frames;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < interval {
            return None;
        }

        let report = FpsReport {
            frames: self.frames,
            elapsed,
        };
        tracing::info!(
            "{:.1} fps ({} frames in {:.2?}, {:.2?}/frame)",
            report.fps(),
            report.frames,
            report.elapsed,
            report.mean_frame_time()
        );
        self.window_start = Some(now);
        self.frames = 0;
        Some(report)
    }
}
