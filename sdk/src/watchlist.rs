//! Watchlist store.
//!
//! Ordered collection of pinned resources and their last-known state,
//! persisted in full after every mutation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::storage::{Storage, WATCHLIST_KEY};
use crate::types::{ResourceDescriptor, ResourceKey, WatchedResource};
use crate::ws::messages::SubscribedResource;

/// Result of applying a pushed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The entry's state was replaced.
    Applied,
    /// No entry has that key; the update was discarded.
    Stale,
}

/// Pinned resources, keyed by identity and kept in pin order.
pub struct Watchlist {
    entries: Vec<WatchedResource>,
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for Watchlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchlist")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Watchlist {
    /// Hydrates the watchlist from storage.
    ///
    /// Missing, unreadable or corrupt data yields an empty watchlist.
    #[must_use]
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let entries = match storage.get(WATCHLIST_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<WatchedResource>>(&raw) {
                Ok(entries) => dedupe(entries),
                Err(err) => {
                    warn!(error = %err, "Discarding corrupt watchlist snapshot");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "Failed to read watchlist snapshot");
                Vec::new()
            }
        };

        debug!(count = entries.len(), "Watchlist hydrated");
        Self { entries, storage }
    }

    /// Pins a resource.
    ///
    /// Returns false, without mutating anything, if the descriptor is invalid
    /// or its key is already pinned.
    pub fn add(&mut self, descriptor: ResourceDescriptor) -> bool {
        self.add_at(descriptor, Utc::now())
    }

    /// Pins a resource with an explicit pin timestamp.
    pub fn add_at(&mut self, descriptor: ResourceDescriptor, added_at: DateTime<Utc>) -> bool {
        if let Err(err) = descriptor.validate() {
            debug!(error = %err, "Rejected pin request");
            return false;
        }

        let key = descriptor.key();
        if self.contains(&key) {
            debug!(key = %key, "Resource already pinned");
            return false;
        }

        self.entries.push(WatchedResource::pinned(descriptor, added_at));
        self.persist();
        true
    }

    /// Unpins a resource. Returns true if an entry was removed.
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.key != key);
        self.persist();
        self.entries.len() != before
    }

    /// Unpins everything.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.persist();
    }

    /// Replaces the state of a pinned resource with a pushed document.
    ///
    /// Key, pin timestamp and plural override are kept.
    pub fn apply_update(&mut self, key: &ResourceKey, new_state: Value) -> UpdateOutcome {
        let Some(entry) = self.entries.iter_mut().find(|entry| &entry.key == key) else {
            warn!(key = %key, "Received update for resource not in watch list");
            return UpdateOutcome::Stale;
        };

        entry.state = new_state;
        self.persist();
        UpdateOutcome::Applied
    }

    /// Removes a resource the server reported as deleted.
    pub fn apply_delete(&mut self, key: &ResourceKey) -> bool {
        self.remove(key)
    }

    /// Returns the entry for a key.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&WatchedResource> {
        self.entries.iter().find(|entry| &entry.key == key)
    }

    /// Returns true if the key is pinned.
    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.get(key).is_some()
    }

    /// Returns all entries in pin order.
    #[must_use]
    pub fn entries(&self) -> &[WatchedResource] {
        &self.entries
    }

    /// Returns the number of pinned resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the full subscribe snapshot, one entry per pinned resource.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscribedResource> {
        self.entries.iter().map(WatchedResource::subscription).collect()
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "Failed to serialize watchlist");
                return;
            }
        };

        if let Err(err) = self.storage.set(WATCHLIST_KEY, &json) {
            warn!(error = %err, "Failed to persist watchlist");
        }
    }
}

fn dedupe(entries: Vec<WatchedResource>) -> Vec<WatchedResource> {
    let mut kept: Vec<WatchedResource> = Vec::with_capacity(entries.len());
    for entry in entries {
        if kept.iter().any(|k| k.key == entry.key) {
            warn!(key = %entry.key, "Dropping duplicate persisted entry");
            continue;
        }
        kept.push(entry);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageError};
    use serde_json::json;

    fn widget(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": name, "namespace": "ns" }
        }))
    }

    fn key(name: &str) -> ResourceKey {
        ResourceKey::from_parts("v1", "Widget", "ns", name)
    }

    fn empty() -> (Watchlist, MemoryStorage) {
        let storage = MemoryStorage::new();
        (Watchlist::load(Arc::new(storage.clone())), storage)
    }

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io("unreadable".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io("read-only".to_string()))
        }
    }

    #[test]
    fn test_add_assigns_key() {
        let (mut list, _) = empty();
        assert!(list.add(widget("a")));
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].key.as_str(), "v1:Widget:ns:a");
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let (mut list, _) = empty();
        assert!(list.add(widget("a")));
        assert!(!list.add(widget("a")));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_add_duplicate_with_different_state_rejected() {
        let (mut list, _) = empty();
        assert!(list.add(widget("a")));
        let again = ResourceDescriptor::new(json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": "a", "namespace": "ns" },
            "status": { "ready": true }
        }));
        assert!(!list.add(again));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_add_invalid_rejected() {
        let (mut list, storage) = empty();
        assert!(!list.add(ResourceDescriptor::new(json!({ "metadata": { "name": "a" } }))));
        assert!(!list.add(ResourceDescriptor::new(json!({ "kind": "Widget" }))));
        assert!(list.is_empty());
        assert_eq!(storage.get(WATCHLIST_KEY).expect("get"), None);
    }

    #[test]
    fn test_add_keeps_order() {
        let (mut list, _) = empty();
        list.add(widget("b"));
        list.add(widget("a"));
        list.add(widget("c"));
        let names: Vec<&str> = list.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_remove() {
        let (mut list, _) = empty();
        list.add(widget("a"));
        list.add(widget("b"));
        assert!(list.remove(&key("a")));
        assert!(!list.remove(&key("a")));
        assert_eq!(list.len(), 1);
        assert!(list.contains(&key("b")));
    }

    #[test]
    fn test_clear_all_persists_empty() {
        let (mut list, storage) = empty();
        list.add(widget("a"));
        list.clear_all();
        assert!(list.is_empty());
        assert_eq!(storage.get(WATCHLIST_KEY).expect("get"), Some("[]".to_string()));
    }

    #[test]
    fn test_apply_update_preserves_identity_metadata() {
        let (mut list, _) = empty();
        let added_at = Utc::now() - chrono::Duration::minutes(5);
        list.add_at(widget("a").with_plural("widgetz"), added_at);

        let new_state = json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": "a", "namespace": "ns" },
            "status": { "x": 1 }
        });
        assert_eq!(list.apply_update(&key("a"), new_state.clone()), UpdateOutcome::Applied);

        let entry = list.get(&key("a")).expect("entry");
        assert_eq!(entry.state, new_state);
        assert_eq!(entry.key, key("a"));
        assert_eq!(entry.added_at, added_at);
        assert_eq!(entry.plural_override.as_deref(), Some("widgetz"));
    }

    #[test]
    fn test_apply_update_unknown_key_is_stale() {
        let (mut list, _) = empty();
        list.add(widget("a"));
        let outcome = list.apply_update(&key("zzz"), json!({ "kind": "Widget" }));
        assert_eq!(outcome, UpdateOutcome::Stale);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_apply_delete_idempotent() {
        let (mut list, _) = empty();
        list.add(widget("a"));
        list.add(widget("b"));

        list.apply_delete(&key("a"));
        let once = list.entries().to_vec();
        list.apply_delete(&key("a"));
        assert_eq!(list.entries(), once.as_slice());
    }

    #[test]
    fn test_subscriptions_match_entries() {
        let (mut list, _) = empty();
        list.add(widget("a"));
        list.add(widget("b").with_plural("widgetz"));

        let subs = list.subscriptions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].name, "a");
        assert_eq!(subs[1].plural, "widgetz");
    }

    #[test]
    fn test_load_restores_persisted_entries() {
        let storage = MemoryStorage::new();
        {
            let mut list = Watchlist::load(Arc::new(storage.clone()));
            list.add(widget("a").with_plural("widgetz"));
            list.apply_update(&key("a"), json!({
                "apiVersion": "v1",
                "kind": "Widget",
                "metadata": { "name": "a", "namespace": "ns" },
                "status": { "x": 2 }
            }));
        }

        let list = Watchlist::load(Arc::new(storage));
        let entry = list.get(&key("a")).expect("entry");
        assert_eq!(entry.state["status"]["x"], json!(2));
        assert_eq!(entry.plural_override.as_deref(), Some("widgetz"));
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let storage = MemoryStorage::new();
        storage.set(WATCHLIST_KEY, "{not json").expect("set");
        let list = Watchlist::load(Arc::new(storage));
        assert!(list.is_empty());
    }

    #[test]
    fn test_load_unreadable_is_empty() {
        let list = Watchlist::load(Arc::new(FailingStorage));
        assert!(list.is_empty());
    }

    #[test]
    fn test_persist_failure_keeps_mutation() {
        let mut list = Watchlist::load(Arc::new(FailingStorage));
        assert!(list.add(widget("a")));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_load_drops_duplicate_keys() {
        let storage = MemoryStorage::new();
        let entry = WatchedResource::pinned(widget("a"), Utc::now());
        let raw = serde_json::to_string(&vec![entry.clone(), entry]).expect("serialize");
        storage.set(WATCHLIST_KEY, &raw).expect("set");

        let list = Watchlist::load(Arc::new(storage));
        assert_eq!(list.len(), 1);
    }
}
