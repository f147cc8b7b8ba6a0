// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Page-flip completion events.
//!
//! The EGL output consumer programs the flip with a caller-chosen token
//! (`EGL_DRM_FLIP_EVENT_DATA_NV`), and the kernel echoes it back as the
//! `user_data` of a `DRM_EVENT_FLIP_COMPLETE` record on the DRM fd.

use std::fmt;
use std::time::Duration;

use crate::core::error::FrameError;

pub const DRM_EVENT_VBLANK: u32 = 0x01;
pub const DRM_EVENT_FLIP_COMPLETE: u32 = 0x02;

/// `struct drm_event` header: type, length.
const HEADER_LEN: usize = 8;
/// `struct drm_event_vblank`.
pub const VBLANK_EVENT_LEN: usize = 32;

/// Per-output correlation value carried through the flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlipToken(usize);

impl FlipToken {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for FlipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A completed page flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipEvent {
    pub token: FlipToken,
    /// Vblank sequence number of the flip.
    pub sequence: u32,
    pub tv_sec: u32,
    pub tv_usec: u32,
    pub crtc_id: u32,
}

impl FlipEvent {
    /// Flip timestamp on the kernel's vblank clock.
    pub fn timestamp(&self) -> Duration {
        Duration::from_secs(u64::from(self.tv_sec)) + Duration::from_micros(u64::from(self.tv_usec))
    }
}

/// One record read from a DRM fd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrmEvent {
    FlipComplete(FlipEvent),
    Vblank(FlipEvent),
    Other { kind: u32, length: u32 },
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_ne_bytes(raw)
}

/// Decode the records in one `read(2)` from a DRM fd.
///
/// Decoding stops at the first record whose header is truncated or whose
/// length does not fit in the buffer.
pub fn decode_events(buf: &[u8]) -> Vec<DrmEvent> {
    let mut events = Vec::new();
    let mut offset = 0;

    while buf.len() - offset >= HEADER_LEN {
        let kind = read_u32(buf, offset);
        let length = read_u32(buf, offset + 4);
        let len = length as usize;
        if len < HEADER_LEN || len > buf.len() - offset {
            tracing::warn!(kind, length, "Malformed DRM event record, dropping rest of read");
            break;
        }

        let record = &buf[offset..offset + len];
        let event = match kind {
            DRM_EVENT_FLIP_COMPLETE | DRM_EVENT_VBLANK if len >= VBLANK_EVENT_LEN => {
                let token = usize::try_from(read_u64(record, 8)).ok();
                let payload = |token| FlipEvent {
                    token,
                    tv_sec: read_u32(record, 16),
                    tv_usec: read_u32(record, 20),
                    sequence: read_u32(record, 24),
                    crtc_id: read_u32(record, 28),
                };
                match (kind, token) {
                    (DRM_EVENT_FLIP_COMPLETE, Some(token)) => {
                        DrmEvent::FlipComplete(payload(FlipToken(token)))
                    }
                    (DRM_EVENT_VBLANK, Some(token)) => DrmEvent::Vblank(payload(FlipToken(token))),
                    // user_data wider than a pointer can't be one of our tokens
                    _ => DrmEvent::Other { kind, length },
                }
            }
            _ => DrmEvent::Other { kind, length },
        };
        events.push(event);
        offset += len;
    }

    events
}

/// Blocking source of flip completions.
pub trait FlipEventSource {
    /// Block until the source has something to read, then hand every
    /// flip completion in that read to `handler`. Returns how many were
    /// delivered, which may be zero.
    fn dispatch(&mut self, handler: &mut dyn FnMut(FlipEvent)) -> Result<usize, FrameError>;
}

/// Deliver the flip completions in `buf` to `handler`.
pub fn dispatch_flips(buf: &[u8], handler: &mut dyn FnMut(FlipEvent)) -> usize {
    let mut delivered = 0;
    for event in decode_events(buf) {
        match event {
            DrmEvent::FlipComplete(flip) => {
                handler(flip);
                delivered += 1;
            }
            other => tracing::trace!("Ignoring DRM event {:?}", other),
        }
    }
    delivered
}

/// Encode a `drm_event_vblank` record. Used to script event sources.
pub fn encode_vblank_record(kind: u32, event: &FlipEvent) -> [u8; VBLANK_EVENT_LEN] {
    let mut record = [0u8; VBLANK_EVENT_LEN];
    record[0..4].copy_from_slice(&kind.to_ne_bytes());
    record[4..8].copy_from_slice(&(VBLANK_EVENT_LEN as u32).to_ne_bytes());
    record[8..16].copy_from_slice(&(event.token.0 as u64).to_ne_bytes());
    record[16..20].copy_from_slice(&event.tv_sec.to_ne_bytes());
    record[20..24].copy_from_slice(&event.tv_usec.to_ne_bytes());
    record[24..28].copy_from_slice(&event.sequence.to_ne_bytes());
    record[28..32].copy_from_slice(&event.crtc_id.to_ne_bytes());
    record
}
