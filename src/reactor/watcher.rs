use std::collections::BTreeMap;

use super::core::Scheduler;
use crate::reactor::poller::OsFd;

/// A readiness callback, invoked with the descriptor that fired.
pub(crate) type StreamCallback = Box<dyn FnMut(&mut Scheduler, OsFd)>;

/// Owns the mapping from descriptor to its registered callbacks.
///
/// Each descriptor carries at most one read callback and one write
/// callback; installing a direction that is already watched replaces
/// the prior callback rather than stacking.
///
/// Keyed by a `BTreeMap` so snapshots, and therefore dispatch, follow
/// a deterministic descriptor order.
pub(crate) struct WatcherRegistry {
    streams: BTreeMap<OsFd, Watcher>,
    serial: u64,
}

#[derive(Default)]
struct Watcher {
    read: Option<Slot>,
    write: Option<Slot>,
}

impl Watcher {
    fn is_vacant(&self) -> bool {
        self.read.is_none() && self.write.is_none()
    }
}

/// One installed callback.
///
/// The serial identifies this particular registration: the engine
/// takes the callback out for the duration of dispatch, and only puts
/// it back if the slot still belongs to the same registration. A
/// callback that unwatches or replaces itself is therefore never
/// resurrected.
struct Slot {
    serial: u64,
    callback: Option<StreamCallback>,
}

impl WatcherRegistry {
    pub(crate) fn new() -> Self {
        Self {
            streams: BTreeMap::new(),
            serial: 0,
        }
    }

    pub(crate) fn watch_read(&mut self, fd: OsFd, callback: StreamCallback) {
        let slot = self.new_slot(callback);
        self.streams.entry(fd).or_default().read = Some(slot);
    }

    pub(crate) fn watch_write(&mut self, fd: OsFd, callback: StreamCallback) {
        let slot = self.new_slot(callback);
        self.streams.entry(fd).or_default().write = Some(slot);
    }

    pub(crate) fn unwatch_read(&mut self, fd: OsFd) {
        if let Some(watcher) = self.streams.get_mut(&fd) {
            watcher.read = None;
            if watcher.is_vacant() {
                self.streams.remove(&fd);
            }
        }
    }

    pub(crate) fn unwatch_write(&mut self, fd: OsFd) {
        if let Some(watcher) = self.streams.get_mut(&fd) {
            watcher.write = None;
            if watcher.is_vacant() {
                self.streams.remove(&fd);
            }
        }
    }

    pub(crate) fn unwatch_all(&mut self, fd: OsFd) {
        self.streams.remove(&fd);
    }

    /// A point-in-time copy of the watched descriptor sets, handed to
    /// the poller for one iteration.
    ///
    /// Registry mutation by callbacks fired during that iteration does
    /// not affect a snapshot already taken.
    pub(crate) fn snapshot(&self) -> (Vec<OsFd>, Vec<OsFd>) {
        let mut reads = Vec::new();
        let mut writes = Vec::new();

        for (&fd, watcher) in &self.streams {
            if watcher.read.is_some() {
                reads.push(fd);
            }
            if watcher.write.is_some() {
                writes.push(fd);
            }
        }

        (reads, writes)
    }

    /// Takes the read callback out for dispatch.
    ///
    /// Returns `None` if the watcher was removed earlier in the same
    /// iteration, which suppresses the dispatch.
    pub(crate) fn begin_read(&mut self, fd: OsFd) -> Option<(u64, StreamCallback)> {
        let slot = self.streams.get_mut(&fd)?.read.as_mut()?;
        let callback = slot.callback.take()?;
        Some((slot.serial, callback))
    }

    /// Takes the write callback out for dispatch.
    pub(crate) fn begin_write(&mut self, fd: OsFd) -> Option<(u64, StreamCallback)> {
        let slot = self.streams.get_mut(&fd)?.write.as_mut()?;
        let callback = slot.callback.take()?;
        Some((slot.serial, callback))
    }

    /// Restores a read callback after dispatch, unless the callback
    /// unwatched or replaced its own registration.
    pub(crate) fn finish_read(&mut self, fd: OsFd, serial: u64, callback: StreamCallback) {
        if let Some(slot) = self.streams.get_mut(&fd).and_then(|w| w.read.as_mut()) {
            if slot.serial == serial && slot.callback.is_none() {
                slot.callback = Some(callback);
            }
        }
    }

    /// Restores a write callback after dispatch.
    pub(crate) fn finish_write(&mut self, fd: OsFd, serial: u64, callback: StreamCallback) {
        if let Some(slot) = self.streams.get_mut(&fd).and_then(|w| w.write.as_mut()) {
            if slot.serial == serial && slot.callback.is_none() {
                slot.callback = Some(callback);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn new_slot(&mut self, callback: StreamCallback) -> Slot {
        self.serial += 1;
        Slot {
            serial: self.serial,
            callback: Some(callback),
        }
    }
}
