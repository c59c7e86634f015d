//! # Gyre
//!
//! **Gyre** is a single-threaded callback reactor: one blocking event loop
//! that many independent components can share without fighting over the
//! underlying polling primitive.
//!
//! The reactor schedules three kinds of work:
//!
//! - **Timers** — one-shot and periodic callbacks with opaque cancellation
//!   handles ([`Reactor::add_timer`], [`Reactor::add_periodic_timer`])
//! - **Ticks** — deferred callbacks that run on the next loop pass, in
//!   strict FIFO order ([`Reactor::future_tick`])
//! - **Stream watchers** — read/write readiness callbacks on raw
//!   descriptors ([`Reactor::watch_read`], [`Reactor::watch_write`])
//!
//! All callbacks run to completion on the thread that calls
//! [`Reactor::run`]. Every callback receives a `&mut` [`Scheduler`], so it
//! can register, cancel, and unwatch freely while the loop is dispatching —
//! no locks, no interior mutability, no reentrancy.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use gyre::Reactor;
//!
//! let mut reactor = Reactor::new();
//!
//! reactor.add_timer(Duration::from_millis(100), |sched, _handle| {
//!     println!("one-shot fired");
//! });
//!
//! reactor.run().unwrap();
//! ```
//!
//! `run()` returns once nothing is left that could ever wake the loop — no
//! active timers, no pending ticks, no watched descriptors — or when
//! [`Scheduler::stop`] is called from a callback.
//!
//! ## Backends
//!
//! The engine blocks in exactly one place: the readiness poller. The
//! [`Poller`] trait has one implementation per backend — `select(2)` as
//! the portable Unix fallback, `epoll(7)` on Linux, and `WSAPoll` on
//! Windows. [`Reactor::new`] picks the default backend for the current
//! target; [`Reactor::with_poller`] accepts any [`Poller`] implementation.

mod reactor;
mod utils;

pub use reactor::poller::{DefaultPoller, OsFd, Poller};
pub use reactor::{Event, Reactor, Scheduler, TimerHandle};

#[cfg(unix)]
pub use reactor::poller::SelectPoller;

#[cfg(target_os = "linux")]
pub use reactor::poller::EpollPoller;

#[cfg(windows)]
pub use reactor::poller::WsaPollPoller;
