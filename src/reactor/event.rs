use crate::reactor::poller::OsFd;

/// A readiness event reported by the poller.
///
/// An `Event` carries readiness information for one watched
/// descriptor. It is produced by the poller and consumed by the
/// reactor, which looks up and invokes the matching callbacks.
///
/// The event indicates whether the descriptor is readable,
/// writable, or both.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    /// The descriptor this event refers to.
    pub fd: OsFd,

    /// Indicates that the descriptor is readable.
    pub readable: bool,

    /// Indicates that the descriptor is writable.
    pub writable: bool,
}
