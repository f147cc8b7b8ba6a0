// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Page-flip events read straight off the DRM descriptor.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};

use crate::core::error::FrameError;
use crate::core::flip_event::{dispatch_flips, FlipEvent, FlipEventSource};

/// Same read size libdrm's `drmHandleEvent` uses.
const READ_BUF_LEN: usize = 1024;

/// Reads events from the descriptor the display connection was created
/// with. Borrowing it ties the reader to the connection's lifetime and
/// keeps mode setting and event delivery on one descriptor.
pub struct DrmEventReader<'a> {
    fd: BorrowedFd<'a>,
    buf: [u8; READ_BUF_LEN],
}

impl<'a> DrmEventReader<'a> {
    pub fn new(fd: BorrowedFd<'a>) -> Self {
        Self {
            fd,
            buf: [0; READ_BUF_LEN],
        }
    }

    /// Block until the descriptor is readable. No timeout.
    ///
    /// An errored or hung-up descriptor with nothing left to read is
    /// reported as an error; polling it again would return at once.
    fn wait_readable(&self) -> io::Result<()> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        loop {
            // SAFETY: one valid pollfd for the duration of the call.
            let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if pfd.revents & libc::POLLNVAL != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "DRM fd is not open",
                ));
            }
            if pfd.revents & libc::POLLERR != 0 {
                return Err(io::Error::other("DRM fd reported an error condition"));
            }
            if pfd.revents & libc::POLLIN == 0 && pfd.revents & libc::POLLHUP != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "DRM fd hung up",
                ));
            }
            return Ok(());
        }
    }

    /// One `read(2)`. Returns 0 when nothing was pending.
    fn read_events(&mut self) -> io::Result<usize> {
        loop {
            // SAFETY: `buf` is valid for `buf.len()` bytes and the fd is
            // borrowed for our lifetime.
            let n = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    self.buf.as_mut_ptr().cast(),
                    self.buf.len(),
                )
            };
            if n > 0 {
                return Ok(n as usize);
            }
            if n == 0 {
                // Readable but empty: the other end is gone.
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "DRM event stream closed",
                ));
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(0),
                _ => return Err(err),
            }
        }
    }
}

impl FlipEventSource for DrmEventReader<'_> {
    fn dispatch(&mut self, handler: &mut dyn FnMut(FlipEvent)) -> Result<usize, FrameError> {
        self.wait_readable()?;
        let len = self.read_events()?;
        if len == 0 {
            tracing::trace!("DRM fd woke with nothing to read");
            return Ok(0);
        }
        Ok(dispatch_flips(&self.buf[..len], handler))
    }
}
