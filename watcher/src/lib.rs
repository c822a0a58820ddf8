//! Crossview Watcher - headless client for the live resource watch.
//!
//! This crate pins the resources named on the command line, keeps them in
//! sync over the dashboard's watch endpoint and logs every change.
//!
//! # Components
//!
//! - [`config`]: Command-line arguments and watcher configuration
//! - [`service`]: Main watcher service

pub mod config;
pub mod service;

pub use config::{ConfigError, WatcherArgs, WatcherConfig};
pub use service::{diff, Change, WatcherError, WatcherService};
