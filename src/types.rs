//! Core types shared by broadcasters and subscriptions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a subscriber, never reused within one broadcaster.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a subscription stopped producing values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The broadcaster was finished.
    Finished,
    /// The consumer cancelled or dropped the subscription.
    Cancelled,
    /// A bounded buffer overflowed and the subscriber was dropped.
    Overflowed,
    /// Subscribed after the broadcaster was already finished.
    Closed,
    /// Every broadcaster handle was dropped without finishing.
    BroadcasterDropped,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::Finished => "finished",
            EndReason::Cancelled => "cancelled",
            EndReason::Overflowed => "buffer overflowed",
            EndReason::Closed => "broadcaster already closed",
            EndReason::BroadcasterDropped => "broadcaster dropped",
        };
        f.write_str(s)
    }
}

/// Per-broadcaster counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcasterStats {
    /// Updates applied (including those after finish).
    pub updates: u64,
    /// Equality-gated updates skipped because the value was unchanged.
    pub skipped: u64,
    /// Subscriptions ever created, including ones created after finish.
    pub subscriptions: u64,
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Subscribers dropped because their bounded buffer overflowed.
    pub overflowed: u64,
    /// Whether `finish()` has been called.
    pub finished: bool,
}
