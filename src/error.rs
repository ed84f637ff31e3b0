//! Error types for broadcasters and subscriptions.

use crate::types::EndReason;
use thiserror::Error;

/// Main error type for the fallible parts of the API.
///
/// The core operations (`read`, `update`, `update_if_changed`, `subscribe`,
/// `finish`) never fail. Errors only come from configuration, non-blocking
/// receives and keyed board lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No value buffered")]
    Empty,

    #[error("Timed out waiting for a value")]
    Timeout,

    #[error("Subscription ended: {0}")]
    Ended(EndReason),

    #[error("State already registered: {0}")]
    AlreadyRegistered(String),

    #[error("State not registered: {0}")]
    NotRegistered(String),
}

impl From<serde_json::Error> for BroadcastError {
    fn from(e: serde_json::Error) -> Self {
        BroadcastError::InvalidConfig(e.to_string())
    }
}

/// Result type for fallible operations.
pub type Result<T> = std::result::Result<T, BroadcastError>;
