//! The broadcaster: current value, registry and counters behind one mutex.

use super::registry::{FanOut, Registry};
use super::subscription::Subscription;
use crate::config::BroadcasterConfig;
use crate::error::Result;
use crate::types::{BroadcasterStats, EndReason, SubscriberId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Everything guarded by the broadcaster's lock.
struct State<T> {
    value: T,
    registry: Registry<T>,
    closed: bool,
    updates: u64,
    skipped: u64,
    subscriptions: u64,
    overflowed: u64,
}

impl<T: Clone> State<T> {
    /// Store `value` and fan it out unless closed.
    fn apply(&mut self, value: T) -> FanOut {
        self.value = value;
        self.publish()
    }

    fn publish(&mut self) -> FanOut {
        self.updates += 1;
        if self.closed {
            return FanOut::default();
        }
        let result = self.registry.fan_out(&self.value);
        self.overflowed += result.overflowed.len() as u64;
        result
    }
}

/// State shared by every handle of one broadcaster. Subscriptions and
/// cancellers only hold a `Weak` to it.
pub(crate) struct Shared<T> {
    state: Mutex<State<T>>,
    next_id: AtomicU64,
    label: String,
}

impl<T> Shared<T> {
    /// Termination hook target. Removing an absent id is a no-op.
    pub(crate) fn unregister(&self, id: SubscriberId, reason: EndReason) {
        let remaining = {
            let mut state = self.state.lock();
            if !state.registry.unregister(id, reason) {
                return;
            }
            state.registry.len()
        };

        debug!(
            broadcaster = %self.label,
            subscriber = %id,
            %reason,
            subscribers = remaining,
            "Subscriber removed"
        );
    }

    fn log_fan_out(&self, result: &FanOut) {
        trace!(
            broadcaster = %self.label,
            delivered = result.delivered,
            "Value published"
        );
        for id in &result.overflowed {
            warn!(
                broadcaster = %self.label,
                subscriber = %id,
                "Subscriber dropped: buffer overflow"
            );
        }
    }
}

/// Holds one current value and multicasts every update to its subscribers.
///
/// Cloning a `Broadcaster` yields another handle to the same state. All
/// operations serialize through one mutex, and none of them blocks while
/// holding it: fan-out only ever does a non-blocking enqueue.
///
/// ```ignore
/// let position = Broadcaster::new(0u64);
/// let mut ui = position.subscribe();
/// assert_eq!(ui.next(), Some(0));
///
/// position.update(1500);
/// assert_eq!(ui.next(), Some(1500));
///
/// position.finish();
/// assert_eq!(ui.next(), None);
/// ```
pub struct Broadcaster<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Broadcaster<T> {
    /// Create a broadcaster holding `initial`, with the default config.
    pub fn new(initial: T) -> Self {
        Self::build(initial, BroadcasterConfig::default())
    }

    /// Create a broadcaster with a custom config.
    pub fn with_config(initial: T, config: BroadcasterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(initial, config))
    }

    pub(crate) fn build_labeled(initial: T, label: String) -> Self {
        Self::build(initial, BroadcasterConfig::labeled(label))
    }

    fn build(initial: T, config: BroadcasterConfig) -> Self {
        let state = State {
            value: initial,
            registry: Registry::new(config.buffer),
            closed: false,
            updates: 0,
            skipped: 0,
            subscriptions: 0,
            overflowed: 0,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                next_id: AtomicU64::new(1),
                label: config.label,
            }),
        }
    }

    /// Current value.
    pub fn read(&self) -> T {
        self.shared.state.lock().value.clone()
    }

    /// Store `value` and deliver it to every current subscriber.
    ///
    /// After [`finish`](Self::finish) the value is still stored, so `read`
    /// reflects it, but nobody receives it.
    pub fn update(&self, value: T) {
        let result = self.shared.state.lock().apply(value);
        self.shared.log_fan_out(&result);
    }

    /// Mutate the current value in place and deliver the result.
    ///
    /// `f` runs while the lock is held. It must not block, and it must not
    /// call into this broadcaster (`read`, `update`, `subscribe`, ...) or
    /// drop one of its subscriptions: the lock is not reentrant, so any of
    /// those deadlocks.
    pub fn update_with<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let result = {
            let mut state = self.shared.state.lock();
            f(&mut state.value);
            state.publish()
        };
        self.shared.log_fan_out(&result);
    }

    /// Register a new subscriber.
    ///
    /// The first element of the returned sequence is the value current at
    /// this call; every later update follows in order. On a finished
    /// broadcaster the sequence is empty and ends with [`EndReason::Closed`].
    pub fn subscribe(&self) -> Subscription<T> {
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let weak = Arc::downgrade(&self.shared);

        let mut state = self.shared.state.lock();
        state.subscriptions += 1;

        if state.closed {
            drop(state);
            debug!(
                broadcaster = %self.shared.label,
                subscriber = %id,
                "Subscribed after finish"
            );
            return Subscription::closed(id, weak);
        }

        // Registration and snapshot share one critical section.
        let (receiver, lifecycle) = state.registry.register(id);
        let snapshot = state.value.clone();
        let subscribers = state.registry.len();
        drop(state);

        debug!(
            broadcaster = %self.shared.label,
            subscriber = %id,
            subscribers,
            "Subscriber added"
        );

        Subscription::new(id, snapshot, receiver, lifecycle, weak)
    }

    /// Close the broadcaster and complete every subscription.
    ///
    /// Subscriptions drain what was already delivered to them, then end.
    /// Calling this again does nothing.
    pub fn finish(&self) {
        let completed = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.registry.close_all(EndReason::Finished)
        };

        debug!(
            broadcaster = %self.shared.label,
            completed,
            "Broadcaster finished"
        );
    }
}

impl<T: Clone + PartialEq> Broadcaster<T> {
    /// Like [`update`](Self::update), but does nothing when `value` equals
    /// the current value. Returns whether the value changed.
    pub fn update_if_changed(&self, value: T) -> bool {
        let result = {
            let mut state = self.shared.state.lock();
            if state.value == value {
                state.skipped += 1;
                return false;
            }
            state.apply(value)
        };
        self.shared.log_fan_out(&result);
        true
    }
}

impl<T> Broadcaster<T> {
    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn stats(&self) -> BroadcasterStats {
        let state = self.shared.state.lock();
        BroadcasterStats {
            updates: state.updates,
            skipped: state.skipped,
            subscriptions: state.subscriptions,
            subscribers: state.registry.len(),
            overflowed: state.overflowed,
            finished: state.closed,
        }
    }
}

impl<T: Clone + Default> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("label", &self.shared.label)
            .finish_non_exhaustive()
    }
}
