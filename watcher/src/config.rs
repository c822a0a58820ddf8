//! Watcher configuration.
//!
//! Provides the command-line arguments and the validated configuration
//! derived from them.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossview_sdk::client::ClientConfig;
use crossview_sdk::ws::config::{DEFAULT_BASE_URL, DEFAULT_RECONNECT_DELAY_SECS};
use crossview_sdk::ws::WatchConfig;
use crossview_sdk::{ResourceRef, StorageConfig};
use serde::{Deserialize, Serialize};

/// Default user name presented to the session.
pub const DEFAULT_USER: &str = "crossview-watcher";

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "crossview-watcher", version, about = "Pin Crossview resources and log live changes")]
pub struct WatcherArgs {
    /// Dashboard base URL.
    #[arg(long, env = "CROSSVIEW_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Cluster context to watch.
    #[arg(long, env = "CROSSVIEW_CONTEXT")]
    pub context: String,

    /// User name the session runs as.
    #[arg(long, env = "CROSSVIEW_USER", default_value = DEFAULT_USER)]
    pub user: String,

    /// Directory holding the persisted watchlist (default `~/.crossview`).
    #[arg(long, env = "CROSSVIEW_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Dashboard session cookie (`connect.sid` value) for fetching resources.
    #[arg(long, env = "CROSSVIEW_SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: Option<String>,

    /// Seconds to wait before reconnecting.
    #[arg(long, default_value_t = DEFAULT_RECONNECT_DELAY_SECS)]
    pub reconnect_delay: u64,

    /// Collapse the panel so updates raise notifications.
    #[arg(long)]
    pub collapsed: bool,

    /// Resources to pin, as `apiVersion/Kind/[namespace/]name`.
    pub resources: Vec<String>,
}

/// Configuration for the watcher service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Dashboard base URL.
    pub base_url: String,

    /// Cluster context to watch.
    pub context: String,

    /// User name the session runs as.
    pub user: String,

    /// Override for the state directory.
    pub state_dir: Option<PathBuf>,

    /// Session cookie sent with resource fetches.
    #[serde(skip_serializing)]
    pub session_cookie: Option<String>,

    /// Reconnect delay in seconds.
    pub reconnect_delay_secs: u64,

    /// Whether to collapse the panel on start.
    pub collapsed: bool,

    /// Resources to pin.
    pub resources: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            context: String::new(),
            user: DEFAULT_USER.to_string(),
            state_dir: None,
            session_cookie: None,
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            collapsed: false,
            resources: Vec::new(),
        }
    }
}

impl From<WatcherArgs> for WatcherConfig {
    fn from(args: WatcherArgs) -> Self {
        Self {
            base_url: args.url,
            context: args.context,
            user: args.user,
            state_dir: args.state_dir,
            session_cookie: args.session_cookie,
            reconnect_delay_secs: args.reconnect_delay,
            collapsed: args.collapsed,
            resources: args.resources,
        }
    }
}

impl WatcherConfig {
    /// Creates a new configuration for a context.
    #[must_use]
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..Default::default()
        }
    }

    /// Sets the resources to pin.
    #[must_use]
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the state directory.
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Sets the session cookie.
    #[must_use]
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watch_config()
            .validate()
            .map_err(|e| ConfigError::InvalidWatchSettings(e.to_string()))?;

        if self.context.trim().is_empty() {
            return Err(ConfigError::MissingContext);
        }

        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingUser);
        }

        self.client_config()
            .validate()
            .map_err(|e| ConfigError::InvalidClientSettings(e.to_string()))?;

        self.parse_resources()?;
        Ok(())
    }

    /// Parses the resource references.
    ///
    /// # Errors
    ///
    /// Returns an error if any reference is malformed.
    pub fn parse_resources(&self) -> Result<Vec<ResourceRef>, ConfigError> {
        self.resources
            .iter()
            .map(|s| ResourceRef::parse(s).ok_or_else(|| ConfigError::InvalidResource(s.clone())))
            .collect()
    }

    /// Returns the watch connection configuration.
    #[must_use]
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::new(self.base_url.clone())
            .with_reconnect_delay(Duration::from_secs(self.reconnect_delay_secs))
    }

    /// Returns the HTTP client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.base_url.clone());
        match &self.session_cookie {
            Some(cookie) => config.with_session_cookie(cookie.clone()),
            None => config,
        }
    }

    /// Returns the storage configuration, scoped to the dashboard host.
    #[must_use]
    pub fn storage_config(&self) -> StorageConfig {
        let config = match &self.state_dir {
            Some(dir) => StorageConfig::with_root(dir.clone()),
            None => StorageConfig::default(),
        };

        let host = self
            .base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, rest)| rest)
            .trim_end_matches('/');
        config.with_scope(host)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Base URL or reconnect delay rejected.
    #[error("invalid watch settings: {0}")]
    InvalidWatchSettings(String),

    /// Session cookie rejected.
    #[error("invalid client settings: {0}")]
    InvalidClientSettings(String),

    /// No context selected.
    #[error("context must not be empty")]
    MissingContext,

    /// No user name.
    #[error("user must not be empty")]
    MissingUser,

    /// Malformed resource reference.
    #[error("invalid resource reference: {0}")]
    InvalidResource(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WatcherConfig::default();
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.user, DEFAULT_USER);
        assert_eq!(config.reconnect_delay_secs, 3);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_config_from_args() {
        let args = WatcherArgs::try_parse_from([
            "crossview-watcher",
            "--url",
            "https://dash.example.com",
            "--context",
            "prod",
            "--reconnect-delay",
            "5",
            "--collapsed",
            "v1/ConfigMap/default/settings",
            "pkg.crossplane.io/v1/Provider/provider-aws",
        ])
        .expect("args");

        let config = WatcherConfig::from(args);
        assert_eq!(config.base_url, "https://dash.example.com");
        assert_eq!(config.context, "prod");
        assert_eq!(config.reconnect_delay_secs, 5);
        assert!(config.collapsed);
        assert_eq!(config.resources.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_session_cookie() {
        let args = WatcherArgs::try_parse_from([
            "crossview-watcher",
            "--context",
            "prod",
            "--session-cookie",
            "s%3Aabc.def",
        ])
        .expect("args");

        let config = WatcherConfig::from(args);
        assert_eq!(config.session_cookie.as_deref(), Some("s%3Aabc.def"));
        assert_eq!(
            config.client_config().cookie_header().as_deref(),
            Some("connect.sid=s%3Aabc.def")
        );
        assert!(config.validate().is_ok());

        let config = WatcherConfig::with_context("prod").with_session_cookie("bad\ncookie");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidClientSettings(_))
        ));
    }

    #[test]
    fn test_config_without_session_cookie() {
        let config = WatcherConfig::with_context("dev");
        assert_eq!(config.client_config().cookie_header(), None);
    }

    #[test]
    fn test_config_validate_missing_context() {
        let config = WatcherConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingContext)));
    }

    #[test]
    fn test_config_validate_bad_url() {
        let config = WatcherConfig::with_context("dev").with_base_url("ftp://example.com");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWatchSettings(_))
        ));
    }

    #[test]
    fn test_config_validate_zero_delay() {
        let config = WatcherConfig {
            reconnect_delay_secs: 0,
            ..WatcherConfig::with_context("dev")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_parse_resources() {
        let config = WatcherConfig::with_context("dev").with_resources(vec![
            "v1/ConfigMap/default/settings".to_string(),
            "apiextensions.crossplane.io/v1/Composition/xnetworks".to_string(),
        ]);
        let resources = config.parse_resources().expect("resources");
        assert_eq!(resources[0].namespace.as_deref(), Some("default"));
        assert_eq!(resources[1].api_version, "apiextensions.crossplane.io/v1");
        assert_eq!(resources[1].namespace, None);
    }

    #[test]
    fn test_config_parse_resources_invalid() {
        let config =
            WatcherConfig::with_context("dev").with_resources(vec!["configmap".to_string()]);
        assert!(matches!(
            config.parse_resources(),
            Err(ConfigError::InvalidResource(ref s)) if s == "configmap"
        ));
    }

    #[test]
    fn test_storage_config_scoped_by_host() {
        let config = WatcherConfig::with_context("dev")
            .with_base_url("http://localhost:3001/")
            .with_state_dir("/tmp/crossview-state");
        let storage = config.storage_config();
        assert_eq!(
            storage.dir(),
            PathBuf::from("/tmp/crossview-state/localhost_3001")
        );
    }
}
