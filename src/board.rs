//! Keyed collection of broadcasters.
//!
//! Components usually expose several pieces of state of the same type
//! (elapsed time, duration, buffered seconds, ...). A [`StateBoard`] owns one
//! broadcaster per key so producers and consumers can find them by name.

use crate::broadcaster::{Broadcaster, Subscription};
use crate::config::BroadcasterConfig;
use crate::error::{BroadcastError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::debug;

/// Broadcasters keyed by the kind of state they carry.
///
/// The board lock is only held to look up or insert handles; broadcaster
/// operations run after it is released.
pub struct StateBoard<K, T> {
    entries: RwLock<HashMap<K, Broadcaster<T>>>,
}

impl<K, T> StateBoard<K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new broadcaster under `key`.
    pub fn register(&self, key: K, initial: T) -> Result<Broadcaster<T>> {
        let config = BroadcasterConfig::labeled(format!("{:?}", key));
        self.register_with_config(key, initial, config)
    }

    /// Register a new broadcaster under `key` with a custom config.
    pub fn register_with_config(
        &self,
        key: K,
        initial: T,
        config: BroadcasterConfig,
    ) -> Result<Broadcaster<T>> {
        let mut entries = self.entries.write();

        if entries.contains_key(&key) {
            return Err(BroadcastError::AlreadyRegistered(format!("{:?}", key)));
        }

        let broadcaster = Broadcaster::with_config(initial, config)?;
        debug!(key = ?key, "State registered");
        entries.insert(key, broadcaster.clone());

        Ok(broadcaster)
    }

    /// Broadcaster under `key`, registering one from `initial` if missing.
    pub fn get_or_register<F>(&self, key: K, initial: F) -> Broadcaster<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get(&key) {
            return existing;
        }

        // Built outside the write lock; `initial` may read this board.
        let candidate = Broadcaster::build_labeled(initial(), format!("{:?}", key));

        let mut entries = self.entries.write();
        entries
            .entry(key)
            .or_insert_with_key(|key| {
                debug!(key = ?key, "State registered");
                candidate
            })
            .clone()
    }

    pub fn get(&self, key: &K) -> Option<Broadcaster<T>> {
        self.entries.read().get(key).cloned()
    }

    fn require(&self, key: &K) -> Result<Broadcaster<T>> {
        self.get(key)
            .ok_or_else(|| BroadcastError::NotRegistered(format!("{:?}", key)))
    }

    /// Current value under `key`.
    pub fn read(&self, key: &K) -> Result<T> {
        Ok(self.require(key)?.read())
    }

    pub fn update(&self, key: &K, value: T) -> Result<()> {
        self.require(key)?.update(value);
        Ok(())
    }

    pub fn subscribe(&self, key: &K) -> Result<Subscription<T>> {
        Ok(self.require(key)?.subscribe())
    }

    /// Remove the broadcaster under `key` and finish it.
    pub fn remove(&self, key: &K) -> Option<Broadcaster<T>> {
        let removed = self.entries.write().remove(key)?;
        removed.finish();
        debug!(key = ?key, "State removed");
        Some(removed)
    }

    /// Finish every broadcaster. They stay registered and readable.
    pub fn finish_all(&self) {
        let all: Vec<Broadcaster<T>> = self.entries.read().values().cloned().collect();
        for broadcaster in &all {
            broadcaster.finish();
        }
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, T> StateBoard<K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone + PartialEq,
{
    /// Equality-gated update under `key`. Returns whether the value changed.
    pub fn update_if_changed(&self, key: &K, value: T) -> Result<bool> {
        Ok(self.require(key)?.update_if_changed(value))
    }
}

impl<K, T> Default for StateBoard<K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
