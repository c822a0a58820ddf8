//! Watch client configuration.
//!
//! Provides configuration options for the watch connection and the timing
//! rules applied to pushed events.

use std::time::Duration;

use reqwest::Url;

use super::error::WsError;
use crate::panel::NotificationPolicy;

/// Default dashboard base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Path of the watch endpoint.
pub const WATCH_PATH: &str = "/api/watch";

/// Default reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;

/// Default flash window in milliseconds.
pub const DEFAULT_FLASH_WINDOW_MS: u64 = crate::flags::DEFAULT_FLASH_WINDOW_MS;

/// Watch client configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Dashboard base URL; its scheme picks `ws` or `wss`.
    pub base_url: String,

    /// Delay before reconnecting after the connection drops.
    pub reconnect_delay: Duration,

    /// How long a key stays flagged as updating.
    pub flash_window: Duration,

    /// Collapsed-panel notification rules.
    pub notifications: NotificationPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            flash_window: Duration::from_millis(DEFAULT_FLASH_WINDOW_MS),
            notifications: NotificationPolicy::default(),
        }
    }
}

impl WatchConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the flash window.
    #[must_use]
    pub fn with_flash_window(mut self, window: Duration) -> Self {
        self.flash_window = window;
        self
    }

    /// Sets the notification rules.
    #[must_use]
    pub fn with_notifications(mut self, policy: NotificationPolicy) -> Self {
        self.notifications = policy;
        self
    }

    /// Returns the watch endpoint URL for a context.
    ///
    /// `https` and `wss` base URLs yield `wss`; everything else yields `ws`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed.
    pub fn watch_url(&self, context: &str) -> Result<String, WsError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| WsError::InvalidConfig(e.to_string()))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| WsError::InvalidConfig(format!("cannot use scheme {}", scheme)))?;
        url.set_path(WATCH_PATH);
        url.set_query(None);
        url.query_pairs_mut().append_pair("context", context);

        Ok(url.to_string())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.base_url.is_empty() {
            return Err(WsError::InvalidConfig("base_url cannot be empty".to_string()));
        }

        let url =
            Url::parse(&self.base_url).map_err(|e| WsError::InvalidConfig(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(WsError::InvalidConfig(
                "base_url must use http, https, ws or wss".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WatchConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.flash_window, Duration::from_millis(500));
    }

    #[test]
    fn test_config_builder() {
        let config = WatchConfig::new("https://dash.example.com")
            .with_reconnect_delay(Duration::from_secs(1))
            .with_flash_window(Duration::from_millis(200));

        assert_eq!(config.base_url, "https://dash.example.com");
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.flash_window, Duration::from_millis(200));
    }

    #[test]
    fn test_watch_url_plain() {
        let config = WatchConfig::new("http://localhost:3001");
        assert_eq!(
            config.watch_url("kind-dev").expect("url"),
            "ws://localhost:3001/api/watch?context=kind-dev"
        );
    }

    #[test]
    fn test_watch_url_secure() {
        let config = WatchConfig::new("https://dash.example.com/some/page?x=1");
        assert_eq!(
            config.watch_url("prod").expect("url"),
            "wss://dash.example.com/api/watch?context=prod"
        );
    }

    #[test]
    fn test_watch_url_encodes_context() {
        let config = WatchConfig::new("http://localhost:3001");
        let url = config
            .watch_url("arn:aws:eks:eu-west-1:123:cluster/prod a")
            .expect("url");
        assert_eq!(
            url,
            "ws://localhost:3001/api/watch?context=arn%3Aaws%3Aeks%3Aeu-west-1%3A123%3Acluster%2Fprod+a"
        );
    }

    #[test]
    fn test_config_validate_valid() {
        assert!(WatchConfig::default().validate().is_ok());
        assert!(WatchConfig::new("wss://example.com").validate().is_ok());
    }

    #[test]
    fn test_config_validate_empty_url() {
        assert!(WatchConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_validate_invalid_scheme() {
        assert!(WatchConfig::new("ftp://example.com").validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_delay() {
        let config = WatchConfig::default().with_reconnect_delay(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
