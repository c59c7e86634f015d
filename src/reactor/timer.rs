use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::core::Scheduler;
use crate::utils::Slab;

/// A timer callback.
///
/// The same shape serves one-shot and periodic timers; callbacks that
/// do not need the handle simply ignore the second argument.
pub(crate) type TimerCallback = Box<dyn FnMut(&mut Scheduler, TimerHandle)>;

/// An opaque, stable reference to a scheduled timer.
///
/// Handles pair an arena slot with a stamp that is unique for the
/// lifetime of the loop, so a handle never aliases a later timer even
/// when its storage slot is reused. Operations on a handle whose timer
/// has fired or been canceled are safe no-ops.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimerHandle {
    index: usize,
    stamp: u64,
}

/// A scheduled timer record.
///
/// The callback slot is taken out for the duration of dispatch and
/// restored afterwards, which is what lets a periodic timer cancel
/// itself from inside its own callback.
struct Timer {
    interval: Duration,
    periodic: bool,
    deadline: Instant,
    callback: Option<TimerCallback>,
}

/// An entry in the timer deadline queue.
///
/// Entries are stored in a binary heap ordered by deadline, with the
/// insertion sequence breaking ties so that simultaneously due timers
/// dispatch in a deterministic order.
///
/// Entries are never removed from the heap on cancellation; instead a
/// stale entry (canceled timer, or a periodic timer that has since been
/// rescheduled) is detected and discarded lazily when it surfaces.
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    handle: TimerHandle,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Orders entries by deadline, then insertion sequence.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap,
    /// where the earliest deadline is popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A timer popped due, ready for dispatch.
pub(crate) struct DueTimer {
    pub(crate) handle: TimerHandle,
    pub(crate) callback: TimerCallback,
    pub(crate) periodic: bool,
}

/// Owns every scheduled timer.
///
/// Records live in a stamped arena so handles stay valid (and
/// detectably stale) across slot reuse; deadlines live in a separate
/// min-heap consulted to bound the poll wait and to pop due timers.
pub(crate) struct TimerRegistry {
    arena: Slab<Timer>,
    queue: BinaryHeap<TimerEntry>,
    seq: u64,
}

impl TimerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            arena: Slab::new(16),
            queue: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Schedules a timer and returns its handle.
    ///
    /// The first deadline is `now + interval`. A zero interval is
    /// valid for one-shot timers and fires on the next pass.
    pub(crate) fn add(
        &mut self,
        now: Instant,
        interval: Duration,
        periodic: bool,
        callback: TimerCallback,
    ) -> TimerHandle {
        let deadline = now + interval;
        let (index, stamp) = self.arena.insert(Timer {
            interval,
            periodic,
            deadline,
            callback: Some(callback),
        });

        let handle = TimerHandle { index, stamp };
        self.push_entry(deadline, handle);

        handle
    }

    /// Cancels a timer.
    ///
    /// Idempotent: canceling a fired, canceled, or unknown handle is a
    /// no-op. The stale heap entry is discarded lazily.
    pub(crate) fn cancel(&mut self, handle: TimerHandle) {
        let _ = self.arena.remove(handle.index, handle.stamp);
    }

    /// Returns `true` iff the handle refers to a scheduled timer.
    ///
    /// A one-shot timer is inactive from the instant it is popped due,
    /// even while its callback is still executing.
    pub(crate) fn is_active(&self, handle: TimerHandle) -> bool {
        self.arena.get(handle.index, handle.stamp).is_some()
    }

    /// The earliest deadline over all scheduled timers, if any.
    ///
    /// Stale heap entries surfacing at the top are discarded here, so
    /// the reported deadline always belongs to a live timer.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        loop {
            let (deadline, handle) = match self.queue.peek() {
                Some(entry) => (entry.deadline, entry.handle),
                None => return None,
            };

            if self.entry_is_live(deadline, handle) {
                return Some(deadline);
            }

            self.queue.pop();
        }
    }

    /// Removes and returns every timer due at `now`, earliest deadline
    /// first.
    ///
    /// One-shot timers are deactivated here, before their callbacks
    /// run. Periodic timers are rescheduled to `now + interval` and
    /// their callbacks taken out for dispatch; [`restore`] puts a
    /// callback back once the invocation is over.
    ///
    /// [`restore`]: TimerRegistry::restore
    pub(crate) fn pop_due(&mut self, now: Instant) -> Vec<DueTimer> {
        let mut due = Vec::new();

        loop {
            let (deadline, handle) = match self.queue.peek() {
                Some(entry) => (entry.deadline, entry.handle),
                None => break,
            };

            if !self.entry_is_live(deadline, handle) {
                self.queue.pop();
                continue;
            }

            if deadline > now {
                break;
            }

            self.queue.pop();

            let periodic = match self.arena.get(handle.index, handle.stamp) {
                Some(timer) => timer.periodic,
                None => continue,
            };

            if periodic {
                let Some(timer) = self.arena.get_mut(handle.index, handle.stamp) else {
                    continue;
                };

                timer.deadline = now + timer.interval;
                let next = timer.deadline;
                let callback = timer.callback.take();

                self.push_entry(next, handle);

                if let Some(callback) = callback {
                    due.push(DueTimer {
                        handle,
                        callback,
                        periodic: true,
                    });
                }
            } else if let Some(timer) = self.arena.remove(handle.index, handle.stamp) {
                if let Some(callback) = timer.callback {
                    due.push(DueTimer {
                        handle,
                        callback,
                        periodic: false,
                    });
                }
            }
        }

        due
    }

    /// Puts a periodic timer's callback back after dispatch.
    ///
    /// If the timer was canceled while its callback ran, the record is
    /// gone and the callback is dropped here.
    pub(crate) fn restore(&mut self, handle: TimerHandle, callback: TimerCallback) {
        if let Some(timer) = self.arena.get_mut(handle.index, handle.stamp) {
            timer.callback = Some(callback);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn push_entry(&mut self, deadline: Instant, handle: TimerHandle) {
        self.seq += 1;
        self.queue.push(TimerEntry {
            deadline,
            seq: self.seq,
            handle,
        });
    }

    /// A heap entry is live iff its timer still exists and has not
    /// been rescheduled to a different deadline since the entry was
    /// pushed.
    fn entry_is_live(&self, deadline: Instant, handle: TimerHandle) -> bool {
        self.arena
            .get(handle.index, handle.stamp)
            .is_some_and(|timer| timer.deadline == deadline)
    }
}
