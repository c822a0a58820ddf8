//! Transient "updating" flags.
//!
//! A key is flagged for a short window after a pushed update lands. Expired
//! keys are treated as absent by every query, so the set never needs an
//! explicit cleanup to stay correct; [`UpdateFlags::prune`] only reclaims
//! memory and tells the caller whether anything visible changed.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::time::Instant;

use crate::types::ResourceKey;

/// Default flash window.
pub const DEFAULT_FLASH_WINDOW_MS: u64 = 500;

/// Keys currently flagged as updating, each with its expiry deadline.
#[derive(Debug, Clone)]
pub struct UpdateFlags {
    window: Duration,
    deadlines: HashMap<ResourceKey, Instant>,
}

impl Default for UpdateFlags {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_FLASH_WINDOW_MS))
    }
}

impl UpdateFlags {
    /// Creates an empty set with the given flash window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Flags a key until `now + window`. Re-marking extends the deadline.
    pub fn mark(&mut self, key: ResourceKey, now: Instant) {
        self.deadlines.insert(key, now + self.window);
    }

    /// Returns true if the key is flagged at `now`.
    #[must_use]
    pub fn is_updating(&self, key: &ResourceKey, now: Instant) -> bool {
        self.deadlines.get(key).is_some_and(|deadline| *deadline > now)
    }

    /// Returns the keys flagged at `now`, sorted.
    #[must_use]
    pub fn active(&self, now: Instant) -> BTreeSet<ResourceKey> {
        self.deadlines
            .iter()
            .filter(|(_, deadline)| **deadline > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Drops expired keys. Returns true if any were dropped.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.deadlines.len();
        self.deadlines.retain(|_, deadline| *deadline > now);
        self.deadlines.len() != before
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Returns true if no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
