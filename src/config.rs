//! Broadcaster configuration.

use crate::error::{BroadcastError, Result};
use serde::{Deserialize, Serialize};

/// How each subscriber's pending values are buffered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Lossless: the producer never blocks and never drops a value.
    #[default]
    Unbounded,
    /// At most `capacity` values pending per subscriber. A subscriber whose
    /// buffer is full when a value arrives is dropped from the registry and
    /// its sequence ends with [`EndReason::Overflowed`](crate::EndReason).
    ///
    /// This is neither overwrite-oldest nor drop-newest: the buffer is never
    /// trimmed, the whole subscriber is dropped instead. Values already
    /// buffered are still delivered; nothing after the overflow is.
    Bounded { capacity: usize },
}

/// Broadcaster configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcasterConfig {
    /// Name used in log fields.
    /// Default: "broadcaster"
    pub label: String,

    /// Per-subscriber buffering.
    /// Default: unbounded
    pub buffer: BufferPolicy,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            label: "broadcaster".to_string(),
            buffer: BufferPolicy::Unbounded,
        }
    }
}

impl BroadcasterConfig {
    /// Default config with the given label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Switch to a bounded buffer of `capacity` values per subscriber.
    pub fn bounded(mut self, capacity: usize) -> Self {
        self.buffer = BufferPolicy::Bounded { capacity };
        self
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(BroadcastError::InvalidConfig(
                "label must not be empty".to_string(),
            ));
        }
        if let BufferPolicy::Bounded { capacity: 0 } = self.buffer {
            return Err(BroadcastError::InvalidConfig(
                "bounded buffer capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
