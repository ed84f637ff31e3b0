//! # statecast
//!
//! A thread-safe container holding one current value that multicasts every
//! update to a dynamic set of subscribers.
//!
//! ## Core Concepts
//!
//! - **Broadcaster**: Current value plus a registry of subscriber channels
//! - **Subscription**: Snapshot at subscribe time, then every later update
//! - **Equality gate**: `update_if_changed` skips values equal to the current one
//! - **StateBoard**: Broadcasters keyed by the kind of state they expose
//!
//! ## Example
//!
//! ```ignore
//! use statecast::Broadcaster;
//!
//! let elapsed = Broadcaster::new(0u64);
//! let mut view = elapsed.subscribe();
//! assert_eq!(view.next(), Some(0));
//!
//! elapsed.update(1);
//! elapsed.update_if_changed(1); // no-op
//! assert_eq!(view.next(), Some(1));
//!
//! elapsed.finish();
//! assert_eq!(view.next(), None);
//! assert_eq!(elapsed.read(), 1);
//! ```

pub mod board;
pub mod broadcaster;
pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use board::StateBoard;
pub use broadcaster::{Broadcaster, Canceller, Subscription};
pub use config::{BroadcasterConfig, BufferPolicy};
pub use error::{BroadcastError, Result};
pub use types::*;
