//! Watch client metrics.
//!
//! Provides atomic counters for monitoring watch activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the watch client.
#[derive(Debug)]
pub struct WatchMetrics {
    /// Connection attempts started.
    connections_attempted: AtomicU64,

    /// Connections that reached the open state.
    connections_opened: AtomicU64,

    /// Reconnects scheduled after a lost connection.
    reconnects_scheduled: AtomicU64,

    /// Subscribe snapshots sent.
    subscribes_sent: AtomicU64,

    /// Pushed updates applied to the watchlist.
    updates_applied: AtomicU64,

    /// Pushed updates for keys no longer watched.
    stale_updates: AtomicU64,

    /// Pushed deletions of watched resources.
    deletes_applied: AtomicU64,

    /// Frames that could not be parsed.
    protocol_errors: AtomicU64,

    /// Error messages reported by the server.
    server_errors: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for WatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_attempted: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            reconnects_scheduled: AtomicU64::new(0),
            subscribes_sent: AtomicU64::new(0),
            updates_applied: AtomicU64::new(0),
            stale_updates: AtomicU64::new(0),
            deletes_applied: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a connection attempt.
    pub fn record_connect_attempt(&self) {
        self.connections_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an opened connection.
    pub fn record_connected(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduled reconnect.
    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a subscribe snapshot sent.
    pub fn record_subscribe(&self) {
        self.subscribes_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an applied update.
    pub fn record_update(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an update for an unwatched key.
    pub fn record_stale_update(&self) {
        self.stale_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pushed deletion that removed a watched resource.
    pub fn record_delete(&self) {
        self.deletes_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an unparseable frame.
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a server-reported error.
    pub fn record_server_error(&self) {
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns connection attempts.
    #[must_use]
    pub fn connections_attempted(&self) -> u64 {
        self.connections_attempted.load(Ordering::Relaxed)
    }

    /// Returns opened connections.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns scheduled reconnects.
    #[must_use]
    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled.load(Ordering::Relaxed)
    }

    /// Returns subscribe snapshots sent.
    #[must_use]
    pub fn subscribes_sent(&self) -> u64 {
        self.subscribes_sent.load(Ordering::Relaxed)
    }

    /// Returns applied updates.
    #[must_use]
    pub fn updates_applied(&self) -> u64 {
        self.updates_applied.load(Ordering::Relaxed)
    }

    /// Returns stale updates.
    #[must_use]
    pub fn stale_updates(&self) -> u64 {
        self.stale_updates.load(Ordering::Relaxed)
    }

    /// Returns pushed deletions that removed a watched resource.
    #[must_use]
    pub fn deletes_applied(&self) -> u64 {
        self.deletes_applied.load(Ordering::Relaxed)
    }

    /// Returns unparseable frames.
    #[must_use]
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    /// Returns server-reported errors.
    #[must_use]
    pub fn server_errors(&self) -> u64 {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the share of pushed updates that hit a watched key (0.0 to 1.0).
    #[must_use]
    pub fn update_hit_rate(&self) -> f64 {
        let applied = self.updates_applied();
        let total = applied + self.stale_updates();
        if total > 0 {
            applied as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> WatchMetricsSnapshot {
        WatchMetricsSnapshot {
            connections_attempted: self.connections_attempted(),
            connections_opened: self.connections_opened(),
            reconnects_scheduled: self.reconnects_scheduled(),
            subscribes_sent: self.subscribes_sent(),
            updates_applied: self.updates_applied(),
            stale_updates: self.stale_updates(),
            deletes_applied: self.deletes_applied(),
            protocol_errors: self.protocol_errors(),
            server_errors: self.server_errors(),
            uptime: self.uptime(),
            update_hit_rate: self.update_hit_rate(),
        }
    }
}

/// A point-in-time snapshot of watch metrics.
#[derive(Debug, Clone)]
pub struct WatchMetricsSnapshot {
    /// Connection attempts.
    pub connections_attempted: u64,
    /// Opened connections.
    pub connections_opened: u64,
    /// Scheduled reconnects.
    pub reconnects_scheduled: u64,
    /// Subscribe snapshots sent.
    pub subscribes_sent: u64,
    /// Applied updates.
    pub updates_applied: u64,
    /// Stale updates.
    pub stale_updates: u64,
    /// Pushed deletions of watched resources.
    pub deletes_applied: u64,
    /// Unparseable frames.
    pub protocol_errors: u64,
    /// Server-reported errors.
    pub server_errors: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Update hit rate.
    pub update_hit_rate: f64,
}
