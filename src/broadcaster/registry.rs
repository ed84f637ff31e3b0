//! Subscriber registry: one private delivery channel per live subscriber.
//!
//! The registry is never shared on its own. It lives inside the broadcaster's
//! state and is only touched while that state's mutex is held.

use crate::config::BufferPolicy;
use crate::types::{EndReason, SubscriberId};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// End-of-life state shared by a registry entry, its subscription and any
/// cancellers. The first recorded reason wins.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    cancelled: AtomicBool,
    reason: OnceLock<EndReason>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lifecycle for a subscription that never got registered.
    pub(crate) fn ended(reason: EndReason) -> Self {
        let lifecycle = Self::default();
        lifecycle.end(reason);
        lifecycle
    }

    pub(crate) fn end(&self, reason: EndReason) {
        let _ = self.reason.set(reason);
    }

    pub(crate) fn reason(&self) -> Option<EndReason> {
        self.reason.get().copied()
    }

    /// Raise the cancel flag. Returns true for the call that raised it.
    pub(crate) fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Registry entry. Holds the only sender of the subscriber's channel, so
/// removing the entry is what signals completion to the receiver.
struct Entry<T> {
    sender: Sender<T>,
    lifecycle: Arc<Lifecycle>,
}

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    pub delivered: usize,
    pub overflowed: Vec<SubscriberId>,
}

pub(crate) struct Registry<T> {
    entries: HashMap<SubscriberId, Entry<T>>,
    buffer: BufferPolicy,
}

impl<T> Registry<T> {
    pub(crate) fn new(buffer: BufferPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            buffer,
        }
    }

    /// Create the subscriber's channel and insert it.
    pub(crate) fn register(&mut self, id: SubscriberId) -> (Receiver<T>, Arc<Lifecycle>) {
        let (sender, receiver) = match self.buffer {
            BufferPolicy::Unbounded => unbounded(),
            BufferPolicy::Bounded { capacity } => bounded(capacity),
        };
        let lifecycle = Arc::new(Lifecycle::new());

        self.entries.insert(
            id,
            Entry {
                sender,
                lifecycle: Arc::clone(&lifecycle),
            },
        );

        (receiver, lifecycle)
    }

    /// Remove an entry. Absent ids are ignored; returns whether one was removed.
    pub(crate) fn unregister(&mut self, id: SubscriberId, reason: EndReason) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                entry.lifecycle.end(reason);
                true
            }
            None => false,
        }
    }

    /// Complete every subscriber and empty the registry. Returns how many
    /// subscribers were completed.
    pub(crate) fn close_all(&mut self, reason: EndReason) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.lifecycle.end(reason);
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Clone> Registry<T> {
    /// Enqueue `value` on every channel without blocking. Subscribers whose
    /// bounded buffer is full are removed.
    pub(crate) fn fan_out(&mut self, value: &T) -> FanOut {
        let mut result = FanOut::default();

        self.entries
            .retain(|id, entry| match entry.sender.try_send(value.clone()) {
                Ok(()) => {
                    result.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    entry.lifecycle.end(EndReason::Overflowed);
                    result.overflowed.push(*id);
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    entry.lifecycle.end(EndReason::Cancelled);
                    false
                }
            });

        result
    }
}
