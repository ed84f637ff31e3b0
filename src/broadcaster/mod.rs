//! Current-value broadcaster.
//!
//! A [`Broadcaster`] holds one value that can be read at any time and
//! multicasts every update to a changing set of subscribers:
//! - Late subscribers first receive the value current when they subscribed
//! - Every later update follows, in order, exactly once
//! - Dropping or cancelling a [`Subscription`] removes it from the registry
//!
//! # Example
//!
//! ```ignore
//! let buffering = Broadcaster::new(0.0f32);
//! let mut sub = buffering.subscribe();
//!
//! std::thread::spawn(move || {
//!     for progress in sub {
//!         println!("buffered {:.0}%", progress * 100.0);
//!     }
//! });
//!
//! buffering.update_if_changed(0.25);
//! buffering.finish();
//! ```

mod cell;
mod registry;
mod subscription;

pub use cell::Broadcaster;
pub use subscription::{Canceller, Subscription};
