//! Reactor core and event dispatch.
//!
//! This module implements the engine of the event loop. The reactor is
//! responsible for:
//! - draining the deferred-tick queue,
//! - computing a bounded wait and driving the readiness poller,
//! - dispatching stream and timer callbacks in a deterministic order.
//!
//! The registries it composes (timers, ticks, watchers) are owned
//! exclusively by the reactor; external code interacts with them only
//! through the handle-based operations on [`Reactor`] and [`Scheduler`].

mod core;
mod event;
mod tick;
mod timer;
mod watcher;

pub(crate) mod poller;

pub use self::core::{Reactor, Scheduler};
pub use self::event::Event;
pub use self::timer::TimerHandle;
