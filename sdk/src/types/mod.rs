//! Core types for the Crossview SDK.
//!
//! This module provides the resource identity and watchlist entry types
//! shared by the store, the protocol and the client.

pub mod resource;
pub mod watched;

pub use resource::{ResourceDescriptor, ResourceKey, ResourceRef};
pub use watched::WatchedResource;
