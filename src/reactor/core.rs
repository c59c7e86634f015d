use std::io;
use std::mem;
use std::time::{Duration, Instant};

use super::event::Event;
use super::poller::{DefaultPoller, OsFd, Poller};
use super::tick::TickQueue;
use super::timer::{TimerHandle, TimerRegistry};
use super::watcher::WatcherRegistry;

/// Run state of the loop.
///
/// `Stopping` is only ever observed between iterations: a stop request
/// raised from inside a callback lets the in-flight iteration finish.
#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopping,
}

/// How long the next poll may block.
enum Wait {
    /// Nothing is registered that could ever produce a wakeup, so the
    /// poll is skipped and the loop falls through to its exit check.
    Skip,

    /// Poll with the given timeout; `None` blocks indefinitely.
    For(Option<Duration>),
}

/// The mutable face of the loop, handed to every callback.
///
/// `Scheduler` owns the timer, tick, and watcher registries and the
/// run-state flag. Callbacks receive `&mut Scheduler` and may register,
/// cancel, enqueue, and unwatch freely while the loop is dispatching;
/// because the scheduler never exposes the poller or [`run`], a
/// callback cannot re-enter the loop.
///
/// [`run`]: Reactor::run
pub struct Scheduler {
    state: State,
    timers: TimerRegistry,
    ticks: TickQueue,
    watchers: WatcherRegistry,
}

impl Scheduler {
    fn new() -> Self {
        Self {
            state: State::Idle,
            timers: TimerRegistry::new(),
            ticks: TickQueue::new(),
            watchers: WatcherRegistry::new(),
        }
    }

    /// Schedules a one-shot timer that fires once `interval` has
    /// elapsed.
    ///
    /// A zero interval is valid: the timer fires on the next iteration,
    /// after one (non-blocking) poll pass. The callback receives the
    /// scheduler and the timer's own handle.
    pub fn add_timer<F>(&mut self, interval: Duration, callback: F) -> TimerHandle
    where
        F: FnMut(&mut Scheduler, TimerHandle) + 'static,
    {
        self.timers
            .add(Instant::now(), interval, false, Box::new(callback))
    }

    /// Schedules a periodic timer that fires every `interval`.
    ///
    /// Each firing reschedules the next deadline from the time the due
    /// timers were popped, so a slow callback delays subsequent firings
    /// rather than causing a burst of catch-up invocations.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn add_periodic_timer<F>(&mut self, interval: Duration, callback: F) -> TimerHandle
    where
        F: FnMut(&mut Scheduler, TimerHandle) + 'static,
    {
        assert!(
            !interval.is_zero(),
            "periodic timer interval must be non-zero"
        );

        self.timers
            .add(Instant::now(), interval, true, Box::new(callback))
    }

    /// Cancels a timer.
    ///
    /// Idempotent: canceling a fired, canceled, or unknown handle is a
    /// no-op, never an error. Cancellation is immediate at the registry
    /// level but does not interrupt a callback already in flight.
    pub fn cancel_timer(&mut self, handle: TimerHandle) {
        self.timers.cancel(handle);
    }

    /// Returns `true` iff the handle refers to a scheduled timer.
    ///
    /// A one-shot timer reports inactive from the instant it fires,
    /// even inside its own callback.
    pub fn is_timer_active(&self, handle: TimerHandle) -> bool {
        self.timers.is_active(handle)
    }

    /// Enqueues a callback to run on a future iteration of the loop.
    ///
    /// Ticks run in strict FIFO order before anything else in an
    /// iteration, and cannot be canceled once enqueued. A tick enqueued
    /// from within a tick runs on the *next* iteration, never the
    /// current drain.
    pub fn future_tick<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.ticks.enqueue(Box::new(callback));
    }

    /// Watches a descriptor for read readiness.
    ///
    /// At most one read callback per descriptor: watching an already
    /// watched descriptor replaces the prior callback. The callback
    /// receives the scheduler and the descriptor, and fires once per
    /// iteration in which the descriptor is ready.
    pub fn watch_read<F>(&mut self, fd: OsFd, callback: F)
    where
        F: FnMut(&mut Scheduler, OsFd) + 'static,
    {
        self.watchers.watch_read(fd, Box::new(callback));
    }

    /// Watches a descriptor for write readiness.
    pub fn watch_write<F>(&mut self, fd: OsFd, callback: F)
    where
        F: FnMut(&mut Scheduler, OsFd) + 'static,
    {
        self.watchers.watch_write(fd, Box::new(callback));
    }

    /// Stops watching a descriptor for read readiness. Idempotent.
    pub fn unwatch_read(&mut self, fd: OsFd) {
        self.watchers.unwatch_read(fd);
    }

    /// Stops watching a descriptor for write readiness. Idempotent.
    pub fn unwatch_write(&mut self, fd: OsFd) {
        self.watchers.unwatch_write(fd);
    }

    /// Removes both directions of a watched descriptor. Idempotent.
    ///
    /// The engine does not detect descriptor closure on its own;
    /// callers must unwatch a descriptor before closing it.
    pub fn unwatch_all(&mut self, fd: OsFd) {
        self.watchers.unwatch_all(fd);
    }

    /// Requests that the loop stop.
    ///
    /// Takes effect at the end of the current iteration, not
    /// mid-dispatch: every callback already committed for this
    /// iteration still runs. Outside [`Reactor::run`] this is a no-op.
    pub fn stop(&mut self) {
        if self.state == State::Running {
            self.state = State::Stopping;
        }
    }

    /// Drains and dispatches the tick queue. Returns whether any tick
    /// ran.
    fn run_ticks(&mut self) -> bool {
        let batch = self.ticks.drain();
        let processed = !batch.is_empty();

        for callback in batch {
            callback(self);
        }

        processed
    }

    /// Computes how long the next poll may block.
    ///
    /// Pending ticks clamp the wait to zero so they are never delayed
    /// behind a blocking poll. With no timers and no tick work the wait
    /// is unbounded — unless nothing is watched either, in which case
    /// polling would block forever and is skipped.
    fn poll_wait(&mut self, processed_ticks: bool) -> Wait {
        if !self.ticks.is_empty() {
            return Wait::For(Some(Duration::ZERO));
        }

        if let Some(deadline) = self.timers.next_deadline() {
            let wait = deadline.saturating_duration_since(Instant::now());
            return Wait::For(Some(wait));
        }

        if processed_ticks {
            return Wait::For(Some(Duration::ZERO));
        }

        if self.watchers.is_empty() {
            return Wait::Skip;
        }

        Wait::For(None)
    }

    /// Dispatches the read callback for a ready descriptor.
    ///
    /// The registry is consulted at invoke time: a watcher removed
    /// earlier in the same iteration no longer fires. The callback is
    /// taken out of its slot for the duration of the call and restored
    /// afterwards unless it unwatched or replaced itself.
    fn run_read(&mut self, fd: OsFd) {
        let Some((serial, mut callback)) = self.watchers.begin_read(fd) else {
            return;
        };

        callback(self, fd);
        self.watchers.finish_read(fd, serial, callback);
    }

    /// Dispatches the write callback for a ready descriptor.
    fn run_write(&mut self, fd: OsFd) {
        let Some((serial, mut callback)) = self.watchers.begin_write(fd) else {
            return;
        };

        callback(self, fd);
        self.watchers.finish_write(fd, serial, callback);
    }

    /// Pops and dispatches every timer due at `now`.
    ///
    /// One-shot timers were already deactivated by the pop. A periodic
    /// timer is skipped if an earlier callback in the same batch
    /// canceled it, and its callback is restored afterwards unless it
    /// canceled itself.
    fn run_due(&mut self, now: Instant) {
        for due in self.timers.pop_due(now) {
            let handle = due.handle;
            let mut callback = due.callback;

            if due.periodic {
                if !self.timers.is_active(handle) {
                    continue;
                }
                callback(self, handle);
                self.timers.restore(handle, callback);
            } else {
                callback(self, handle);
            }
        }
    }

    fn has_work(&self) -> bool {
        !self.timers.is_empty() || !self.ticks.is_empty() || !self.watchers.is_empty()
    }
}

/// The event loop engine.
///
/// A `Reactor` composes a [`Scheduler`] with a readiness [`Poller`]
/// and owns the `run`/`stop` state machine. It is the only component
/// callers interact with directly; all registration operations are
/// forwarded to the scheduler, so code that holds either type uses the
/// same surface.
///
/// The engine is strictly single-threaded: all registry access and all
/// callback execution happen on the thread that calls [`run`], and the
/// poller wait is the only blocking point. There is no bound on
/// individual callback execution — a slow callback delays the entire
/// loop, which is the caller's responsibility.
///
/// [`run`]: Reactor::run
pub struct Reactor<P = DefaultPoller> {
    scheduler: Scheduler,
    poller: P,
    events: Vec<Event>,
}

impl Reactor {
    /// Creates a reactor backed by the default poller for this target.
    pub fn new() -> Self {
        Self::with_poller(DefaultPoller::new())
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Poller> Reactor<P> {
    /// Creates a reactor backed by the given poller.
    pub fn with_poller(poller: P) -> Self {
        Self {
            scheduler: Scheduler::new(),
            poller,
            events: Vec::with_capacity(64),
        }
    }

    /// Runs the loop until it is stopped or runs out of work.
    ///
    /// Returns once [`stop`] was requested, or once no active timers,
    /// no pending ticks, and no watched descriptors remain — at that
    /// point nothing could ever wake the loop again. Registered state
    /// persists across calls, so `run` may be entered again later and
    /// resumes where the previous call left off.
    ///
    /// # Errors
    ///
    /// A poller failure other than an interrupted wait is fatal and
    /// escapes here. Callback panics are not caught; they unwind out
    /// of `run` and indicate a defect in host code.
    ///
    /// [`stop`]: Scheduler::stop
    pub fn run(&mut self) -> io::Result<()> {
        self.scheduler.state = State::Running;
        let result = self.drive();
        self.scheduler.state = State::Idle;
        result
    }

    fn drive(&mut self) -> io::Result<()> {
        loop {
            self.turn()?;

            if self.scheduler.state == State::Stopping || !self.scheduler.has_work() {
                return Ok(());
            }
        }
    }

    /// One iteration: drain ticks, poll with a bounded wait, dispatch
    /// ready streams, then dispatch due timers.
    ///
    /// Ticks run first because they are the cheapest, most
    /// deterministic unit of work and must not be delayed by a
    /// blocking poll. Timers are popped by the time sampled *after*
    /// the poll returns, so a zero-duration wait lets a timer fire on
    /// the same pass that discovers it due, and a long poll never
    /// makes timers fire early relative to wall-clock.
    fn turn(&mut self) -> io::Result<()> {
        let processed_ticks = self.scheduler.run_ticks();

        let timeout = match self.scheduler.poll_wait(processed_ticks) {
            Wait::Skip => return Ok(()),
            Wait::For(timeout) => timeout,
        };

        let (reads, writes) = self.scheduler.watchers.snapshot();

        let mut events = mem::take(&mut self.events);
        events.clear();

        if let Err(err) = self.poller.poll(&reads, &writes, timeout, &mut events) {
            self.events = events;
            return Err(err);
        }

        for event in &events {
            if event.readable {
                self.scheduler.run_read(event.fd);
            }
            if event.writable {
                self.scheduler.run_write(event.fd);
            }
        }
        self.events = events;

        self.scheduler.run_due(Instant::now());

        Ok(())
    }

    /// See [`Scheduler::add_timer`].
    pub fn add_timer<F>(&mut self, interval: Duration, callback: F) -> TimerHandle
    where
        F: FnMut(&mut Scheduler, TimerHandle) + 'static,
    {
        self.scheduler.add_timer(interval, callback)
    }

    /// See [`Scheduler::add_periodic_timer`].
    pub fn add_periodic_timer<F>(&mut self, interval: Duration, callback: F) -> TimerHandle
    where
        F: FnMut(&mut Scheduler, TimerHandle) + 'static,
    {
        self.scheduler.add_periodic_timer(interval, callback)
    }

    /// See [`Scheduler::cancel_timer`].
    pub fn cancel_timer(&mut self, handle: TimerHandle) {
        self.scheduler.cancel_timer(handle);
    }

    /// See [`Scheduler::is_timer_active`].
    pub fn is_timer_active(&self, handle: TimerHandle) -> bool {
        self.scheduler.is_timer_active(handle)
    }

    /// See [`Scheduler::future_tick`].
    pub fn future_tick<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.scheduler.future_tick(callback);
    }

    /// See [`Scheduler::watch_read`].
    pub fn watch_read<F>(&mut self, fd: OsFd, callback: F)
    where
        F: FnMut(&mut Scheduler, OsFd) + 'static,
    {
        self.scheduler.watch_read(fd, callback);
    }

    /// See [`Scheduler::watch_write`].
    pub fn watch_write<F>(&mut self, fd: OsFd, callback: F)
    where
        F: FnMut(&mut Scheduler, OsFd) + 'static,
    {
        self.scheduler.watch_write(fd, callback);
    }

    /// See [`Scheduler::unwatch_read`].
    pub fn unwatch_read(&mut self, fd: OsFd) {
        self.scheduler.unwatch_read(fd);
    }

    /// See [`Scheduler::unwatch_write`].
    pub fn unwatch_write(&mut self, fd: OsFd) {
        self.scheduler.unwatch_write(fd);
    }

    /// See [`Scheduler::unwatch_all`].
    pub fn unwatch_all(&mut self, fd: OsFd) {
        self.scheduler.unwatch_all(fd);
    }

    /// See [`Scheduler::stop`].
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }
}
