//! Windows `WSAPoll`-based poller implementation.
//!
//! This module provides a readiness-based Windows backend. It mirrors
//! the semantics of the Unix `select` and `epoll` pollers using
//! non-blocking sockets and `WSAPoll`.
//!
//! Responsibilities:
//! - Initialize Winsock (once per process)
//! - Block waiting for readiness on the snapshot descriptor sets
//! - Support timer-driven wakeups via poll timeouts
//!
//! Unlike an IOCP backend, this poller is **readiness-based** and does
//! not rely on overlapped or completion-based I/O.

use super::common::Interest;
use crate::reactor::event::Event;
use crate::reactor::poller::{OsFd, Poller};

use std::collections::BTreeMap;
use std::io;
use std::mem;
use std::sync::Once;
use std::time::Duration;

use windows_sys::Win32::Networking::WinSock::{
    POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, SOCKET, SOCKET_ERROR, WSADATA, WSAPOLLFD, WSAPoll,
    WSAStartup,
};

static WINSOCK_INIT: Once = Once::new();

fn makeword(low: u8, high: u8) -> u16 {
    ((high as u16) << 8) | low as u16
}

/// Initializes Winsock exactly once per process.
fn ensure_winsock() {
    WINSOCK_INIT.call_once(|| unsafe {
        let mut data: WSADATA = mem::zeroed();
        let rc = WSAStartup(makeword(2, 2), &mut data as *mut _);
        assert_eq!(rc, 0, "WSAStartup failed: {}", rc);
    });
}

/// Windows poller based on `WSAPoll`.
///
/// The poller is stateless: every call builds its `WSAPOLLFD` array
/// from the descriptor snapshot it is handed. `WSAPoll` rejects an
/// empty array, so a pure timer sleep falls back to `thread::sleep`.
pub struct WsaPollPoller;

impl WsaPollPoller {
    /// Creates a new `WsaPollPoller`, initializing Winsock if this is
    /// the first poller in the process.
    pub fn new() -> Self {
        ensure_winsock();
        Self
    }
}

impl Default for WsaPollPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller for WsaPollPoller {
    fn poll(
        &mut self,
        reads: &[OsFd],
        writes: &[OsFd],
        timeout: Option<Duration>,
        events: &mut Vec<Event>,
    ) -> io::Result<()> {
        if reads.is_empty() && writes.is_empty() {
            if let Some(timeout) = timeout {
                if !timeout.is_zero() {
                    std::thread::sleep(timeout);
                }
            }
            return Ok(());
        }

        // Keyed by descriptor so the resulting event order is
        // deterministic across calls.
        let mut interests: BTreeMap<OsFd, Interest> = BTreeMap::new();

        for &fd in reads {
            interests.entry(fd).or_default().read = true;
        }
        for &fd in writes {
            interests.entry(fd).or_default().write = true;
        }

        let mut fds: Vec<WSAPOLLFD> = Vec::with_capacity(interests.len());

        for (&fd, &interest) in &interests {
            let mut ev = 0;
            if interest.read {
                ev |= POLLIN;
            }
            if interest.write {
                ev |= POLLOUT;
            }

            fds.push(WSAPOLLFD {
                fd: fd as SOCKET,
                events: ev,
                revents: 0,
            });
        }

        let timeout_ms = timeout
            .map(|t| t.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        let rc = unsafe { WSAPoll(fds.as_mut_ptr(), fds.len() as u32, timeout_ms) };
        if rc == SOCKET_ERROR {
            return Err(io::Error::last_os_error());
        }

        // Translate readiness into reactor events. Error, hangup, and
        // invalid-socket conditions wake both directions so the owning
        // callbacks get a chance to observe closure.
        for pfd in &fds {
            let re = pfd.revents as i32;
            if re == 0 {
                continue;
            }

            let fd = pfd.fd as OsFd;
            let readable = re & (POLLIN | POLLERR | POLLHUP | POLLNVAL) as i32 != 0;
            let writable = re & (POLLOUT | POLLERR | POLLHUP | POLLNVAL) as i32 != 0;

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
