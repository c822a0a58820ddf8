//! Crossview SDK - live resource watch for the Crossview dashboard.
//!
//! This crate lets a client pin Kubernetes resources and keep them current
//! through the dashboard's `/api/watch` WebSocket.
//!
//! # Core Types
//!
//! - [`ResourceKey`] - Identity of a resource across clusters
//! - [`ResourceDescriptor`] - A resource document about to be pinned
//! - [`WatchedResource`] - A pinned resource and its latest state
//!
//! # State
//!
//! - [`Watchlist`] - Persisted, ordered set of pinned resources
//! - [`UpdateFlags`] - Short-lived "recently updated" markers
//! - [`PanelState`] - Collapse flag and notification feed
//!
//! # Clients
//!
//! - [`ws::WatchClient`] - The live watch connection
//! - [`client::ResourceClient`] - Fetches a resource over HTTP before pinning
//!
//! # Example
//!
//! ```rust
//! use crossview_sdk::{ResourceDescriptor, ResourceKey};
//! use serde_json::json;
//!
//! let descriptor = ResourceDescriptor::new(json!({
//!     "apiVersion": "apps/v1",
//!     "kind": "Deployment",
//!     "metadata": { "name": "web", "namespace": "prod" }
//! }));
//! assert_eq!(descriptor.key(), ResourceKey::from("apps/v1:Deployment:prod:web"));
//! ```

pub mod client;
pub mod error;
pub mod flags;
pub mod metrics;
pub mod panel;
pub mod storage;
pub mod types;
pub mod watchlist;
pub mod ws;

pub use error::SdkError;
pub use flags::UpdateFlags;
pub use metrics::{WatchMetrics, WatchMetricsSnapshot};
pub use panel::{Notification, NotificationPolicy, PanelState};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageConfig, StorageError};
pub use types::{ResourceDescriptor, ResourceKey, ResourceRef, WatchedResource};
pub use watchlist::{UpdateOutcome, Watchlist};
