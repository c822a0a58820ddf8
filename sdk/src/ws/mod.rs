//! Live watch connection.
//!
//! This module keeps one WebSocket open to the dashboard's watch endpoint
//! while a user is signed in, a context is selected and something is pinned.
//! Pushed updates and deletions flow into the watchlist.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crossview_sdk::storage::MemoryStorage;
//! use crossview_sdk::ws::{WatchClient, WatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = WatchClient::spawn(WatchConfig::default(), Arc::new(MemoryStorage::new()))?;
//!
//!     handle.set_user(Some("admin".to_string())).await?;
//!     handle.set_context(Some("kind-dev".to_string())).await?;
//!     handle.add(serde_json::json!({
//!         "apiVersion": "v1",
//!         "kind": "ConfigMap",
//!         "metadata": { "name": "settings", "namespace": "default" }
//!     })).await?;
//!
//!     let mut updates = handle.subscribe();
//!     while updates.changed().await.is_ok() {
//!         println!("{:?}", updates.borrow().connection);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod session;

pub use client::{WatchClient, WatchHandle, WatchSnapshot};
pub use config::WatchConfig;
pub use error::WsError;
pub use messages::{ClientMessage, ServerMessage, SubscribedResource};
pub use session::{ConnectionSession, ConnectionState, Effect, SessionEvent};
