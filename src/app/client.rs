//! HTTP client for fetching scripts and their assets
//!
//! This module handles the configuration and construction of the shared
//! HTTP client, and exposes the status-checked streaming GET used by
//! individual transfers. There is no retry or rate limiting here: a failed
//! request is fatal to the owning install attempt.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::http;
use crate::errors::{TransferError, TransferResult};

/// Configuration for the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of connections per host
    pub pool_max_per_host: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> reqwest::Result<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build()
    }
}

/// Shared HTTP client for script and asset transfers
#[derive(Debug, Clone)]
pub struct ScriptClient {
    client: Client,
}

impl ScriptClient {
    /// Creates a client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `TransferError` if the underlying HTTP client cannot be built
    pub fn new() -> TransferResult<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `TransferError` if the underlying HTTP client cannot be built
    pub fn with_config(config: &ClientConfig) -> TransferResult<Self> {
        let client = config
            .build_http_client()
            .map_err(|e| TransferError::Request {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Issue a GET and return the response once headers are in
    ///
    /// The response status is checked here so a transfer never starts
    /// streaming a body it is going to reject.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Status` on a non-success status and
    /// `TransferError::Request` on network failure.
    pub async fn begin_get(&self, url: &Url) -> TransferResult<reqwest::Response> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| TransferError::request(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::debug!("Transfer started: {}", url);
        Ok(response)
    }
}
