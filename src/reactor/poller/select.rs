//! Portable `select(2)`-based poller implementation.
//!
//! This module provides the fallback backend for any Unix target. It
//! relies on nothing beyond the `select` syscall, at the cost of the
//! `FD_SETSIZE` ceiling on descriptor values and a linear scan of the
//! watched sets per wakeup.
//!
//! Responsibilities:
//! - Block waiting for readiness on the snapshot descriptor sets
//! - Support timer-driven wakeups via microsecond-precision timeouts
//! - Retry transparently when the wait is interrupted by a signal
//!
//! This backend is selected automatically on Unix targets without a
//! higher-throughput native poller.

use crate::reactor::event::Event;
use crate::reactor::poller::{OsFd, Poller};

use std::io;
use std::mem;
use std::ptr;
use std::time::{Duration, Instant};

/// Portable poller based on `select(2)`.
///
/// The poller is stateless: every call rebuilds its `fd_set` bitmasks
/// from the descriptor snapshot it is handed, which also resets the
/// masks `select` mutates in place.
pub struct SelectPoller;

impl SelectPoller {
    /// Creates a new `SelectPoller`.
    pub fn new() -> Self {
        Self
    }
}

impl Default for SelectPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller for SelectPoller {
    fn poll(
        &mut self,
        reads: &[OsFd],
        writes: &[OsFd],
        timeout: Option<Duration>,
        events: &mut Vec<Event>,
    ) -> io::Result<()> {
        for &fd in reads.iter().chain(writes.iter()) {
            if fd < 0 || fd as usize >= libc::FD_SETSIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "descriptor outside the select(2) FD_SETSIZE range",
                ));
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let mut read_set: libc::fd_set = unsafe { mem::zeroed() };
            let mut write_set: libc::fd_set = unsafe { mem::zeroed() };
            let mut nfds = 0;

            for &fd in reads {
                unsafe { libc::FD_SET(fd, &mut read_set) };
                nfds = nfds.max(fd + 1);
            }
            for &fd in writes {
                unsafe { libc::FD_SET(fd, &mut write_set) };
                nfds = nfds.max(fd + 1);
            }

            // select mutates the timeval on Linux; rebuild it per attempt.
            let mut tv = libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            };
            let tv_ptr = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    tv.tv_sec = remaining.as_secs() as libc::time_t;
                    tv.tv_usec = remaining.subsec_micros() as libc::suseconds_t;
                    &mut tv as *mut libc::timeval
                }
                None => ptr::null_mut(),
            };

            let rc = unsafe {
                libc::select(
                    nfds,
                    &mut read_set,
                    &mut write_set,
                    ptr::null_mut(),
                    tv_ptr,
                )
            };

            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if rc > 0 {
                for &fd in reads {
                    if unsafe { libc::FD_ISSET(fd, &read_set) } {
                        push_event(events, fd, true, false);
                    }
                }
                for &fd in writes {
                    if unsafe { libc::FD_ISSET(fd, &write_set) } {
                        push_event(events, fd, false, true);
                    }
                }
            }

            return Ok(());
        }
    }
}

/// Folds readiness into an existing event for the descriptor, so a
/// descriptor ready in both directions yields a single event.
fn push_event(events: &mut Vec<Event>, fd: OsFd, readable: bool, writable: bool) {
    if let Some(event) = events.iter_mut().find(|e| e.fd == fd) {
        event.readable |= readable;
        event.writable |= writable;
    } else {
        events.push(Event {
            fd,
            readable,
            writable,
        });
    }
}
