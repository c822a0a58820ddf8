//! Watched resource entry.
//!
//! Provides the watchlist entry type and the identity it announces to the
//! server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{ResourceDescriptor, ResourceKey};
use crate::ws::messages::SubscribedResource;

/// A pinned resource together with its last-known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedResource {
    /// API group and version.
    pub api_version: String,

    /// Resource kind.
    pub kind: String,

    /// Resource name.
    pub name: String,

    /// Namespace, absent for cluster-scoped resources.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Plural override carried over from the pin request.
    #[serde(default, rename = "plural")]
    pub plural_override: Option<String>,

    /// Most recent full document.
    pub state: Value,

    /// Identity key.
    pub key: ResourceKey,

    /// When the resource was pinned.
    pub added_at: DateTime<Utc>,
}

impl WatchedResource {
    /// Creates an entry from a pin request.
    #[must_use]
    pub fn pinned(descriptor: ResourceDescriptor, added_at: DateTime<Utc>) -> Self {
        let key = descriptor.key();
        Self {
            api_version: descriptor.api_version().to_string(),
            kind: descriptor.kind().to_string(),
            name: descriptor.name().to_string(),
            namespace: descriptor.namespace().map(str::to_string),
            plural_override: descriptor.plural,
            state: descriptor.document,
            key,
            added_at,
        }
    }

    /// Returns the identity announced in subscribe messages.
    #[must_use]
    pub fn subscription(&self) -> SubscribedResource {
        SubscribedResource {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone().unwrap_or_default(),
            plural: self.plural_override.clone().unwrap_or_default(),
        }
    }

    /// Returns `Kind/name`, used in notifications.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}
