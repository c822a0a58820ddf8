//! Client configuration.
//!
//! The dashboard keeps logins in an express session, so authenticated calls
//! carry its `connect.sid` cookie.

use std::time::Duration;

use super::error::ClientError;

/// Default base URL for the dashboard.
pub const DEFAULT_BASE_URL: &str = crate::ws::config::DEFAULT_BASE_URL;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Name of the dashboard session cookie.
pub const SESSION_COOKIE_NAME: &str = "connect.sid";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the dashboard.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum number of retries for timed out requests.
    pub max_retries: u32,

    /// Session cookie, either a bare session id or `name=value`.
    pub session_cookie: Option<String>,

    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            session_cookie: None,
            user_agent: format!("crossview-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the session cookie. A bare value is sent as `connect.sid=<value>`.
    #[must_use]
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the `Cookie` header value, if a session cookie is set.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let cookie = self.session_cookie.as_deref()?.trim();
        if cookie.contains('=') {
            Some(cookie.to_string())
        } else {
            Some(format!("{}={}", SESSION_COOKIE_NAME, cookie))
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.is_empty() {
            return Err(ClientError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::InvalidConfig(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if let Some(cookie) = &self.session_cookie {
            if cookie.trim().is_empty() || cookie.chars().any(char::is_control) {
                return Err(ClientError::InvalidConfig(
                    "session_cookie must be non-empty printable text".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.session_cookie.is_none());
        assert!(config.user_agent.starts_with("crossview-sdk/"));
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://dash.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
            .with_session_cookie("connect.sid=abc")
            .with_user_agent("ops-bot/1.0");

        assert_eq!(config.base_url, "https://dash.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.session_cookie, Some("connect.sid=abc".to_string()));
        assert_eq!(config.user_agent, "ops-bot/1.0");
    }

    #[test]
    fn test_config_validate() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("ws://localhost:3001").validate().is_err());
        assert!(ClientConfig::default()
            .with_session_cookie("  ")
            .validate()
            .is_err());
        assert!(ClientConfig::default()
            .with_session_cookie("abc\r\n")
            .validate()
            .is_err());
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(ClientConfig::default().cookie_header(), None);

        let bare = ClientConfig::default().with_session_cookie("s%3Aabc.def");
        assert_eq!(bare.cookie_header().as_deref(), Some("connect.sid=s%3Aabc.def"));

        let named = ClientConfig::default().with_session_cookie("connect.sid=s%3Aabc");
        assert_eq!(named.cookie_header().as_deref(), Some("connect.sid=s%3Aabc"));
    }
}
