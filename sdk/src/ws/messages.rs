//! WebSocket message types.
//!
//! Defines the message types for the watch endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ResourceKey;

/// Identity of one resource in a subscribe snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedResource {
    /// API group and version.
    pub api_version: String,
    /// Resource kind.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Namespace, empty for cluster-scoped resources.
    pub namespace: String,
    /// Plural override, empty if none.
    pub plural: String,
}

impl SubscribedResource {
    /// Returns the identity key of this resource.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::from_parts(&self.api_version, &self.kind, &self.namespace, &self.name)
    }
}

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Full replacement of the set of resources to push.
    Subscribe {
        /// Every resource currently watched.
        resources: Vec<SubscribedResource>,
    },
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// A watched resource changed; carries the full document.
    Updated {
        /// Full resource document.
        resource: Value,
    },
    /// A watched resource is gone; carries at least its identity fields.
    Deleted {
        /// Resource identity document.
        resource: Value,
    },
    /// Server-side failure report.
    Error {
        /// Error text.
        #[serde(default)]
        error: String,
    },
}

impl ServerMessage {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a known message.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns the message type tag.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::Error { .. } => "error",
        }
    }
}
