// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Animated full-screen clear colour.

use scanout::{FrameContext, FrameRenderer};

/// Each channel pulses at its own rate, scaled to at most 80% intensity.
pub fn clear_color(seconds: f64) -> [f32; 4] {
    let channel = |rate: f64| (((seconds * rate).sin() / 2.0 + 0.5) * 0.8) as f32;
    [channel(3.0), channel(5.0), channel(7.0), 1.0]
}

/// Clears the whole surface. Needs GL loaded for the current context.
#[derive(Debug, Default)]
pub struct ClearColorRenderer;

impl FrameRenderer for ClearColorRenderer {
    fn render(&mut self, frame: &FrameContext) {
        let [r, g, b, a] = clear_color(frame.elapsed.as_secs_f64());
        // SAFETY: the scheduler only renders with this output's context
        // current, and GL was loaded from that context's EGL.
        unsafe {
            gl::Viewport(0, 0, frame.width as i32, frame.height as i32);
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }
    }
}
