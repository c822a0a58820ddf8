//! Watch panel state.
//!
//! Holds the persisted collapse flag and the notification feed raised for
//! pushed updates while the panel is collapsed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::storage::{Storage, COLLAPSED_KEY};
use crate::types::ResourceKey;

/// Message shown for a pushed update.
pub const UPDATED_MESSAGE: &str = "Watched resource updated";

/// Timing rules for collapsed-panel notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPolicy {
    /// Updates this soon after the connection opened are initial sync noise.
    pub initial_sync_grace: Duration,
    /// Minimum gap between two notifications for one key.
    pub throttle: Duration,
    /// A listed notification younger than this suppresses a new one for the same key.
    pub dedupe_window: Duration,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            initial_sync_grace: Duration::from_secs(5),
            throttle: Duration::from_secs(1),
            dedupe_window: Duration::from_secs(2),
        }
    }
}

/// A notification about a watched resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique id, used to dismiss it.
    pub id: String,
    /// Human-readable message.
    pub message: String,
    /// `Kind/name` of the resource.
    pub resource_name: String,
    /// Identity key of the resource.
    pub resource_key: ResourceKey,
    /// When it was raised.
    pub timestamp: DateTime<Utc>,
    #[serde(skip, default = "Instant::now")]
    raised_at: Instant,
}

/// Collapse flag plus notification feed.
pub struct PanelState {
    storage: Arc<dyn Storage>,
    collapsed: bool,
    policy: NotificationPolicy,
    notifications: Vec<Notification>,
    last_raised: HashMap<ResourceKey, Instant>,
    counter: u64,
}

impl fmt::Debug for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelState")
            .field("collapsed", &self.collapsed)
            .field("notifications", &self.notifications.len())
            .finish()
    }
}

impl PanelState {
    /// Loads the collapse flag; anything but `"true"` reads as expanded.
    #[must_use]
    pub fn load(storage: Arc<dyn Storage>, policy: NotificationPolicy) -> Self {
        let collapsed = match storage.get(COLLAPSED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                warn!(error = %err, "Failed to read panel state");
                false
            }
        };

        Self {
            storage,
            collapsed,
            policy,
            notifications: Vec::new(),
            last_raised: HashMap::new(),
            counter: 0,
        }
    }

    /// Returns true if the panel is collapsed.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Flips and persists the collapse flag. Returns the new value.
    pub fn toggle_collapse(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        let value = if self.collapsed { "true" } else { "false" };
        if let Err(err) = self.storage.set(COLLAPSED_KEY, value) {
            warn!(error = %err, "Failed to persist panel state");
        }
        self.collapsed
    }

    /// Returns the listed notifications, oldest first.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Records an applied update and raises a notification if the rules allow.
    ///
    /// `connected_at` is when the current connection opened. Returns true if
    /// a notification was raised.
    pub fn on_update(
        &mut self,
        key: &ResourceKey,
        resource_name: &str,
        connected_at: Option<Instant>,
        now: Instant,
    ) -> bool {
        if !self.collapsed {
            return false;
        }

        if let Some(opened) = connected_at {
            if now.saturating_duration_since(opened) < self.policy.initial_sync_grace {
                debug!(key = %key, "Ignoring notification for initial sync update");
                return false;
            }
        }

        if let Some(last) = self.last_raised.get(key) {
            if now.saturating_duration_since(*last) <= self.policy.throttle {
                return false;
            }
        }

        let duplicate = self.notifications.iter().any(|n| {
            &n.resource_key == key
                && now.saturating_duration_since(n.raised_at) < self.policy.dedupe_window
        });
        if duplicate {
            return false;
        }

        self.counter += 1;
        let timestamp = Utc::now();
        let notification = Notification {
            id: format!("{}-{}-{}", timestamp.timestamp_millis(), self.counter, key),
            message: UPDATED_MESSAGE.to_string(),
            resource_name: resource_name.to_string(),
            resource_key: key.clone(),
            timestamp,
            raised_at: now,
        };

        self.last_raised.insert(key.clone(), now);
        self.notifications.push(notification);
        true
    }

    /// Dismisses a notification. Returns true if it was listed.
    pub fn remove_notification(&mut self, id: &str) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        self.notifications.len() != before
    }
}
