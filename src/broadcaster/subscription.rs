//! Consumer side: the lazy sequence of values one subscriber observes.

use super::cell::Shared;
use super::registry::Lifecycle;
use crate::error::{BroadcastError, Result};
use crate::types::{EndReason, SubscriberId};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// How long a receive may wait.
enum Wait {
    Block,
    Try,
    Timeout(Duration),
}

/// One subscriber's view of a broadcaster.
///
/// Yields the snapshot taken at subscribe time, then every later update in
/// order. Iteration blocks until the next value arrives and ends when the
/// broadcaster finishes or the subscription is cancelled. Dropping the
/// subscription unregisters it.
///
/// Not restartable: call `subscribe()` again for a fresh view.
pub struct Subscription<T> {
    id: SubscriberId,
    snapshot: Option<T>,
    receiver: Receiver<T>,
    lifecycle: Arc<Lifecycle>,
    shared: Weak<Shared<T>>,
    terminated: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        id: SubscriberId,
        snapshot: T,
        receiver: Receiver<T>,
        lifecycle: Arc<Lifecycle>,
        shared: Weak<Shared<T>>,
    ) -> Self {
        Self {
            id,
            snapshot: Some(snapshot),
            receiver,
            lifecycle,
            shared,
            terminated: false,
        }
    }

    /// A subscription that ends before yielding anything.
    pub(crate) fn closed(id: SubscriberId, shared: Weak<Shared<T>>) -> Self {
        let (_, receiver) = unbounded();
        Self {
            id,
            snapshot: None,
            receiver,
            lifecycle: Arc::new(Lifecycle::ended(EndReason::Closed)),
            shared,
            terminated: false,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next value if one is already available.
    ///
    /// Returns [`BroadcastError::Empty`] when nothing is buffered yet and
    /// [`BroadcastError::Ended`] once the subscription has terminated.
    pub fn try_next(&mut self) -> Result<T> {
        self.poll(Wait::Try)
    }

    /// Wait up to `timeout` for the next value.
    pub fn next_timeout(&mut self, timeout: Duration) -> Result<T> {
        self.poll(Wait::Timeout(timeout))
    }

    /// Values ready to be taken without waiting.
    pub fn pending(&self) -> usize {
        // Nothing more is delivered once cancelled.
        if self.terminated || self.lifecycle.is_cancelled() {
            return 0;
        }
        self.receiver.len() + usize::from(self.snapshot.is_some())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Why the sequence ended, once it has.
    pub fn end_reason(&self) -> Option<EndReason> {
        if self.terminated {
            self.lifecycle.reason()
        } else {
            None
        }
    }

    /// Handle that can cancel this subscription from another thread.
    pub fn canceller(&self) -> Canceller<T> {
        Canceller {
            id: self.id,
            lifecycle: Arc::clone(&self.lifecycle),
            shared: self.shared.clone(),
        }
    }

    /// Stop listening and unregister now.
    pub fn cancel(mut self) {
        self.terminate(EndReason::Cancelled);
    }

    fn poll(&mut self, wait: Wait) -> Result<T> {
        if self.terminated {
            return Err(BroadcastError::Ended(self.terminate(EndReason::Cancelled)));
        }
        if self.lifecycle.is_cancelled() {
            return Err(BroadcastError::Ended(self.terminate(EndReason::Cancelled)));
        }
        if let Some(snapshot) = self.snapshot.take() {
            return Ok(snapshot);
        }

        let received = match wait {
            Wait::Block => self.receiver.recv().ok(),
            Wait::Try => match self.receiver.try_recv() {
                Ok(value) => Some(value),
                Err(TryRecvError::Empty) => return Err(BroadcastError::Empty),
                Err(TryRecvError::Disconnected) => None,
            },
            Wait::Timeout(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(value) => Some(value),
                Err(RecvTimeoutError::Timeout) => return Err(BroadcastError::Timeout),
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };

        // A cancel may land while we were waiting.
        if self.lifecycle.is_cancelled() {
            return Err(BroadcastError::Ended(self.terminate(EndReason::Cancelled)));
        }

        match received {
            Some(value) => Ok(value),
            None => {
                // Every sender is gone: either the registry recorded why, or
                // the broadcaster itself was dropped.
                let reason = self
                    .lifecycle
                    .reason()
                    .unwrap_or(EndReason::BroadcasterDropped);
                Err(BroadcastError::Ended(self.terminate(reason)))
            }
        }
    }

    /// Termination hook. Runs its side effects once; returns the final reason.
    fn terminate(&mut self, reason: EndReason) -> EndReason {
        if !self.terminated {
            self.terminated = true;
            self.snapshot = None;
            if let Some(shared) = self.shared.upgrade() {
                shared.unregister(self.id, reason);
            }
            self.lifecycle.end(reason);
        }
        self.lifecycle.reason().unwrap_or(reason)
    }
}

impl<T> Iterator for Subscription<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.poll(Wait::Block).ok()
    }
}

impl<T> FusedIterator for Subscription<T> {}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.terminate(EndReason::Cancelled);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

/// Cancels a subscription from any thread.
///
/// Cancelling wakes a consumer blocked in `next()`, which then ends without
/// yielding anything further. Cancelling twice, or after the subscription
/// has already ended, does nothing.
pub struct Canceller<T> {
    id: SubscriberId,
    lifecycle: Arc<Lifecycle>,
    shared: Weak<Shared<T>>,
}

impl<T> Canceller<T> {
    pub fn cancel(&self) {
        if !self.lifecycle.cancel() {
            return;
        }
        // Dropping the registry entry drops the sender, which wakes the receiver.
        if let Some(shared) = self.shared.upgrade() {
            shared.unregister(self.id, EndReason::Cancelled);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl<T> Clone for Canceller<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            lifecycle: Arc::clone(&self.lifecycle),
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Canceller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceller").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::broadcaster::Broadcaster;
    use crate::error::BroadcastError;
    use crate::types::EndReason;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_snapshot_first() {
        let broadcaster = Broadcaster::new(3);
        broadcaster.update(4);

        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.pending(), 1);
        assert_eq!(sub.next(), Some(4));
        assert!(matches!(sub.try_next(), Err(BroadcastError::Empty)));
    }

    #[test]
    fn test_drop_unregisters() {
        let broadcaster = Broadcaster::new(0);
        let sub = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_cancel_ends_immediately() {
        let broadcaster = Broadcaster::new(0);
        let mut sub = broadcaster.subscribe();
        let canceller = sub.canceller();

        broadcaster.update(1);
        canceller.cancel();
        assert!(canceller.is_cancelled());
        assert_eq!(broadcaster.subscriber_count(), 0);

        // Buffered values are not delivered after a cancel
        assert_eq!(sub.next(), None);
        assert!(sub.is_terminated());
        assert_eq!(sub.end_reason(), Some(EndReason::Cancelled));

        // Idempotent
        canceller.cancel();
    }

    #[test]
    fn test_cancel_wakes_blocked_consumer() {
        let broadcaster = Broadcaster::new(0u32);
        let mut sub = broadcaster.subscribe();
        let canceller = sub.canceller();

        let consumer = thread::spawn(move || {
            let mut seen = Vec::new();
            for value in sub.by_ref() {
                seen.push(value);
            }
            (seen, sub.end_reason())
        });

        thread::sleep(Duration::from_millis(50));
        canceller.cancel();

        let (seen, reason) = consumer.join().unwrap();
        assert_eq!(seen, vec![0]);
        assert_eq!(reason, Some(EndReason::Cancelled));
    }

    #[test]
    fn test_pending_zero_after_cancel() {
        let broadcaster = Broadcaster::new(0);
        let sub = broadcaster.subscribe();
        broadcaster.update(1);
        broadcaster.update(2);
        assert_eq!(sub.pending(), 3);

        sub.canceller().cancel();
        assert_eq!(sub.pending(), 0);
        assert!(!sub.is_terminated());
    }

    #[test]
    fn test_explicit_cancel() {
        let broadcaster = Broadcaster::new(0);
        let sub = broadcaster.subscribe();
        sub.cancel();
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_finish_drains_then_ends() {
        let broadcaster = Broadcaster::new(0);
        let mut sub = broadcaster.subscribe();

        broadcaster.update(1);
        broadcaster.update(2);
        broadcaster.finish();
        broadcaster.update(3);

        let values: Vec<_> = sub.by_ref().collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(sub.end_reason(), Some(EndReason::Finished));

        // Fused
        assert_eq!(sub.next(), None);
        assert_eq!(
            sub.try_next(),
            Err(BroadcastError::Ended(EndReason::Finished))
        );
    }

    #[test]
    fn test_subscribe_after_finish_is_empty() {
        let broadcaster = Broadcaster::new(9);
        broadcaster.finish();

        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.pending(), 0);
        assert_eq!(sub.next(), None);
        assert_eq!(sub.end_reason(), Some(EndReason::Closed));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_broadcaster_dropped() {
        let broadcaster = Broadcaster::new(1);
        let mut sub = broadcaster.subscribe();
        broadcaster.update(2);
        drop(broadcaster);

        assert_eq!(sub.next(), Some(1));
        assert_eq!(sub.next(), Some(2));
        assert_eq!(sub.next(), None);
        assert_eq!(sub.end_reason(), Some(EndReason::BroadcasterDropped));
    }

    #[test]
    fn test_next_timeout() {
        let broadcaster = Broadcaster::new(0);
        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.next_timeout(Duration::from_millis(10)), Ok(0));
        assert_eq!(
            sub.next_timeout(Duration::from_millis(10)),
            Err(BroadcastError::Timeout)
        );

        let producer = broadcaster.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.update(7);
        });
        assert_eq!(sub.next_timeout(Duration::from_secs(5)), Ok(7));
        handle.join().unwrap();
    }

    #[test]
    fn test_overflowed_subscription_drains() {
        use crate::config::BroadcasterConfig;

        let broadcaster =
            Broadcaster::with_config(0, BroadcasterConfig::default().bounded(2)).unwrap();
        let mut slow = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        broadcaster.update(1);
        assert_eq!(fast.next(), Some(0));
        assert_eq!(fast.next(), Some(1));
        broadcaster.update(2);
        assert_eq!(fast.next(), Some(2));
        broadcaster.update(3);
        assert_eq!(fast.next(), Some(3));

        let values: Vec<_> = slow.by_ref().collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(slow.end_reason(), Some(EndReason::Overflowed));
        assert_eq!(broadcaster.subscriber_count(), 1);
    }
}
