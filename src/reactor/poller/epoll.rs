//! Linux `epoll`-based poller implementation.
//!
//! This module provides the Linux backend. It is functionally
//! equivalent to the portable `select` poller and exposes the same
//! snapshot-driven contract, without the `FD_SETSIZE` ceiling.
//!
//! Responsibilities:
//! - Reconcile the kernel interest list with each iteration's snapshot
//! - Block waiting for readiness events
//! - Support timer-driven wakeups via poll timeouts
//! - Retry transparently when the wait is interrupted by a signal
//!
//! This backend is selected automatically on Linux targets.

use super::common::Interest;
use crate::reactor::event::Event;
use crate::reactor::poller::{OsFd, Poller};

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::collections::HashMap;
use std::io;
use std::ptr;
use std::time::{Duration, Instant};

/// Linux `epoll` poller.
///
/// This poller owns:
/// - an `epoll` instance,
/// - the interest list currently registered with the kernel,
/// - a reusable buffer for kernel events.
///
/// `epoll` is stateful where the poller contract is not: interests
/// live in the kernel across calls. The poller bridges the gap by
/// diffing each call's snapshot against what it last registered and
/// issuing the minimal set of `epoll_ctl` updates.
pub struct EpollPoller {
    /// Epoll file descriptor.
    epoll: OsFd,

    /// Interests currently registered with the kernel.
    registered: HashMap<OsFd, Interest>,

    /// Reusable buffer for epoll events.
    buffer: Vec<epoll_event>,
}

impl EpollPoller {
    /// Creates a new `EpollPoller`.
    pub fn new() -> Self {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        assert!(epoll >= 0, "epoll_create1 failed");

        Self {
            epoll,
            registered: HashMap::new(),
            buffer: Vec::with_capacity(64),
        }
    }

    /// Brings the kernel interest list in line with the snapshot.
    fn reconcile(&mut self, reads: &[OsFd], writes: &[OsFd]) -> io::Result<()> {
        let mut desired: HashMap<OsFd, Interest> =
            HashMap::with_capacity(reads.len() + writes.len());

        for &fd in reads {
            desired.entry(fd).or_default().read = true;
        }
        for &fd in writes {
            desired.entry(fd).or_default().write = true;
        }

        let stale: Vec<OsFd> = self
            .registered
            .keys()
            .filter(|fd| !desired.contains_key(fd))
            .copied()
            .collect();

        for fd in stale {
            // The descriptor may already be closed; nothing to report then.
            unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, ptr::null_mut()) };
            self.registered.remove(&fd);
        }

        for (&fd, &interest) in &desired {
            match self.registered.get(&fd) {
                Some(&current) if current == interest => {}
                Some(_) => self.ctl(EPOLL_CTL_MOD, fd, interest)?,
                None => self.ctl(EPOLL_CTL_ADD, fd, interest)?,
            }
        }

        self.registered = desired;

        Ok(())
    }

    fn ctl(&self, op: libc::c_int, fd: OsFd, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: fd as u64,
        };

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl Default for EpollPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller for EpollPoller {
    fn poll(
        &mut self,
        reads: &[OsFd],
        writes: &[OsFd],
        timeout: Option<Duration>,
        events: &mut Vec<Event>,
    ) -> io::Result<()> {
        self.reconcile(reads, writes)?;

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let timeout_ms = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .as_millis()
                    .min(i32::MAX as u128) as i32,
                None => -1,
            };

            unsafe {
                self.buffer.set_len(self.buffer.capacity());
            }

            let n = unsafe {
                epoll_wait(
                    self.epoll,
                    self.buffer.as_mut_ptr(),
                    self.buffer.capacity() as i32,
                    timeout_ms,
                )
            };

            if n < 0 {
                unsafe {
                    self.buffer.set_len(0);
                }

                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            unsafe {
                self.buffer.set_len(n as usize);
            }

            break;
        }

        for ev in &self.buffer {
            let fd = ev.u64 as OsFd;

            // Error and hangup conditions wake both directions so the
            // owning callbacks get a chance to observe closure.
            let readable = ev.events & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0;
            let writable = ev.events & ((EPOLLOUT | EPOLLERR | EPOLLHUP) as u32) != 0;

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

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll);
        }
    }
}
