//! HTTP client implementation.
//!
//! Provides the client for fetching single resources from the dashboard.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::config::ClientConfig;
use super::error::ClientError;
use crate::types::ResourceRef;

/// Path of the single-resource endpoint.
pub const RESOURCE_PATH: &str = "/api/resource";

/// Error body returned by the dashboard.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for the dashboard REST API.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ResourceClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(cookie) = config.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self { config, http })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the request URL for a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed.
    pub fn resource_url(
        &self,
        resource: &ResourceRef,
        context: Option<&str>,
    ) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        url.set_path(RESOURCE_PATH);
        url.set_query(None);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apiVersion", &resource.api_version);
            query.append_pair("kind", &resource.kind);
            query.append_pair("name", &resource.name);
            if let Some(namespace) = resource.namespace.as_deref().filter(|ns| !ns.is_empty()) {
                query.append_pair("namespace", namespace);
            }
            if let Some(context) = context.filter(|c| !c.is_empty()) {
                query.append_pair("context", context);
            }
            if let Some(plural) = resource.plural.as_deref().filter(|p| !p.is_empty()) {
                query.append_pair("plural", plural);
            }
        }

        Ok(url)
    }

    /// Fetches the current document of a resource.
    ///
    /// # Arguments
    ///
    /// * `resource` - Coordinates of the resource
    /// * `context` - Optional cluster context name
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the resource does not exist.
    pub async fn get_resource(
        &self,
        resource: &ResourceRef,
        context: Option<&str>,
    ) -> Result<Value, ClientError> {
        let url = self.resource_url(resource, context)?;
        debug!(url = %url, "Fetching resource");

        let result = self
            .request_with_retry(|| self.http.get(url.clone()))
            .await;

        match result {
            Err(ClientError::NotFound(_)) => Err(ClientError::NotFound(resource.to_string())),
            other => other,
        }
    }

    /// Makes a request with retry on timeout.
    async fn request_with_retry<F>(&self, request_fn: F) -> Result<Value, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            let response = request_fn().send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| ClientError::Deserialization(e.to_string()))?;

                    if status.is_success() {
                        return serde_json::from_str(&body)
                            .map_err(|e| ClientError::Deserialization(e.to_string()));
                    }

                    return Err(error_for_status(status, &body));
                }
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_millis(100 * (1 << retry_count))).await;
                        last_error = Some(ClientError::from(e));
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::Timeout))
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::BAD_REQUEST => ClientError::BadRequest(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
