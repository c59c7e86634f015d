//! Platform-specific readiness polling.
//!
//! This module provides a unified interface over synchronous readiness
//! multiplexing mechanisms (such as `epoll` on Linux).
//!
//! The poller is the one place the engine blocks: given the watched
//! descriptor sets for an iteration and a maximum wait, it sleeps until
//! at least one descriptor is ready or the wait elapses.
//!
//! The engine is generic over the [`Poller`] trait and never branches
//! on backend identity; [`DefaultPoller`] is a compile-time alias for
//! the backend best suited to the current target.

#[cfg(any(target_os = "linux", windows))]
pub(crate) mod common;

#[cfg(unix)]
mod select;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(windows)]
mod wsapoll;

#[cfg(unix)]
pub use select::SelectPoller;

#[cfg(target_os = "linux")]
pub use epoll::EpollPoller;

#[cfg(windows)]
pub use wsapoll::WsaPollPoller;

#[cfg(target_os = "linux")]
pub type DefaultPoller = epoll::EpollPoller;

#[cfg(all(unix, not(target_os = "linux")))]
pub type DefaultPoller = select::SelectPoller;

#[cfg(windows)]
pub type DefaultPoller = wsapoll::WsaPollPoller;

use std::io;
use std::time::Duration;

use crate::reactor::event::Event;

/// A raw descriptor value as seen by the operating system.
#[cfg(unix)]
pub type OsFd = std::os::unix::io::RawFd;

/// A raw socket value as seen by the operating system.
#[cfg(windows)]
pub type OsFd = std::os::windows::io::RawSocket;

/// A synchronous readiness multiplexer.
///
/// The engine hands the poller a point-in-time snapshot of the watched
/// descriptor sets every iteration; the poller owns no registration
/// state the engine depends on.
pub trait Poller {
    /// Blocks until at least one watched descriptor is ready or the
    /// timeout elapses, pushing one [`Event`] per ready descriptor.
    ///
    /// A `timeout` of `None` blocks indefinitely; `Some(Duration::ZERO)`
    /// returns immediately with whatever is already ready. Empty
    /// descriptor sets are valid and turn the call into a pure sleep.
    ///
    /// An interrupted wait (`EINTR`) is retried internally against the
    /// remaining timeout and never surfaces; any other failure of the
    /// underlying call is returned and is fatal to the loop.
    fn poll(
        &mut self,
        reads: &[OsFd],
        writes: &[OsFd],
        timeout: Option<Duration>,
        events: &mut Vec<Event>,
    ) -> io::Result<()>;
}
