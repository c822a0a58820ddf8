//! Main watcher service.
//!
//! Fetches the requested resources, pins them, then follows the watch client
//! and logs every change until asked to stop.

use std::future::Future;
use std::sync::Arc;

use crossview_sdk::client::{ClientError, ResourceClient};
use crossview_sdk::ws::{ConnectionState, WatchClient, WatchHandle, WatchSnapshot, WsError};
use crossview_sdk::{
    FileStorage, ResourceDescriptor, ResourceKey, ResourceRef, SdkError, Storage,
};
use tracing::{debug, info, warn};

use super::config::{ConfigError, WatcherConfig};

/// Watcher errors.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be built.
    #[error("resource client error: {0}")]
    Client(#[from] ClientError),

    /// Watch client could not be started.
    #[error("watch client error: {0}")]
    Watch(#[from] WsError),

    /// Watch client stopped unexpectedly.
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// One observable difference between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Connection state changed.
    Connection(ConnectionState),
    /// A resource was pinned.
    Pinned(ResourceKey),
    /// A resource was unpinned or deleted on the server.
    Unpinned(ResourceKey),
    /// A pinned resource received a new state.
    Updated(ResourceKey),
    /// A notification was raised.
    Notified {
        /// Notification id.
        id: String,
        /// `Kind/name` of the resource.
        resource_name: String,
    },
}

/// Lists the changes from `prev` to `next`.
#[must_use]
pub fn diff(prev: &WatchSnapshot, next: &WatchSnapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    if prev.connection != next.connection {
        changes.push(Change::Connection(next.connection));
    }

    for resource in &prev.resources {
        if next.get(&resource.key).is_none() {
            changes.push(Change::Unpinned(resource.key.clone()));
        }
    }

    for resource in &next.resources {
        match prev.get(&resource.key) {
            None => changes.push(Change::Pinned(resource.key.clone())),
            Some(old) if old.state != resource.state => {
                changes.push(Change::Updated(resource.key.clone()));
            }
            Some(_) => {}
        }
    }

    for notification in &next.notifications {
        if !prev.notifications.iter().any(|n| n.id == notification.id) {
            changes.push(Change::Notified {
                id: notification.id.clone(),
                resource_name: notification.resource_name.clone(),
            });
        }
    }

    changes
}

/// The watcher service.
pub struct WatcherService {
    /// Configuration.
    config: WatcherConfig,

    /// Parsed resource references.
    resources: Vec<ResourceRef>,

    /// Fetches resources before pinning.
    client: ResourceClient,

    /// Watchlist and panel storage.
    storage: Arc<dyn Storage>,
}

impl WatcherService {
    /// Creates a service persisting to the configured state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WatcherConfig) -> Result<Self, WatcherError> {
        let storage = Arc::new(FileStorage::new(&config.storage_config()));
        Self::with_storage(config, storage)
    }

    /// Creates a service with a custom storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_storage(
        config: WatcherConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, WatcherError> {
        config.validate()?;
        let resources = config.parse_resources()?;
        let client = ResourceClient::new(config.client_config())?;

        Ok(Self {
            config,
            resources,
            client,
            storage,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Starts the watch client and pins the requested resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch client cannot be started.
    pub async fn start(&self) -> Result<WatchHandle, WatcherError> {
        let handle = WatchClient::spawn(self.config.watch_config(), Arc::clone(&self.storage))?;

        let pinned = self.pin_all(&handle).await?;
        info!(
            requested = self.resources.len(),
            pinned,
            total = handle.snapshot().resources.len(),
            "Resources pinned"
        );

        if self.config.collapsed && !handle.snapshot().collapsed {
            handle.toggle_collapse().await?;
        }

        handle.set_user(Some(self.config.user.clone())).await?;
        handle
            .set_context(Some(self.config.context.clone()))
            .await?;

        Ok(handle)
    }

    /// Fetches and pins every requested resource. Returns how many were newly
    /// pinned; fetch failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch client has stopped.
    pub async fn pin_all(&self, handle: &WatchHandle) -> Result<usize, WatcherError> {
        let mut pinned = 0;

        for resource in &self.resources {
            let document = match self
                .client
                .get_resource(resource, Some(&self.config.context))
                .await
            {
                Ok(document) => document,
                Err(err) => {
                    warn!(resource = %resource, error = %err, "Failed to fetch resource");
                    continue;
                }
            };

            let mut descriptor = ResourceDescriptor::new(document);
            if let Some(plural) = &resource.plural {
                descriptor = descriptor.with_plural(plural.clone());
            }

            if handle.add(descriptor).await? {
                pinned += 1;
            } else {
                debug!(resource = %resource, "Resource already pinned");
            }
        }

        Ok(pinned)
    }

    /// Runs until `shutdown` resolves, logging every change.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch client cannot be started.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), WatcherError>
    where
        F: Future<Output = ()>,
    {
        let handle = self.start().await?;
        let mut updates = handle.subscribe();
        let mut last = updates.borrow_and_update().clone();

        info!(context = %self.config.context, "Watcher service started");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        warn!("Watch client stopped");
                        break;
                    }
                    let next = updates.borrow_and_update().clone();
                    for change in diff(&last, &next) {
                        self.report(&handle, &next, change).await;
                    }
                    last = next;
                }
            }
        }

        if let Err(err) = handle.shutdown().await {
            debug!(error = %err, "Watch client already stopped");
        }

        let metrics = handle.metrics().snapshot();
        info!(
            connections = metrics.connections_opened,
            reconnects = metrics.reconnects_scheduled,
            updates = metrics.updates_applied,
            stale = metrics.stale_updates,
            deletes = metrics.deletes_applied,
            protocol_errors = metrics.protocol_errors,
            server_errors = metrics.server_errors,
            uptime_secs = metrics.uptime.as_secs(),
            "Watcher service stopped"
        );

        Ok(())
    }

    async fn report(&self, handle: &WatchHandle, snapshot: &WatchSnapshot, change: Change) {
        match change {
            Change::Connection(state) => info!(state = %state, "Connection state changed"),
            Change::Pinned(key) => info!(key = %key, "Resource pinned"),
            Change::Unpinned(key) => info!(key = %key, "Resource no longer watched"),
            Change::Updated(key) => {
                let version = snapshot
                    .get(&key)
                    .and_then(|r| r.state.pointer("/metadata/resourceVersion"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                info!(key = %key, resource_version = version, "Resource updated");
            }
            Change::Notified { id, resource_name } => {
                info!(resource = %resource_name, "Watched resource updated");
                // Shown once in the log, then dismissed.
                if let Err(err) = handle.remove_notification(id).await {
                    debug!(error = %err, "Failed to dismiss notification");
                }
            }
        }
    }
}
