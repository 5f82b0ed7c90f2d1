//! Transport configuration.

use std::time::Duration;
use url::Url;

use crate::error::{GraphError, GraphResult};

/// Configuration for the Graph transport.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Service root, e.g. `https://graph.microsoft.com`.
    pub endpoint: Url,
    /// API version segment, e.g. `v1.0` or `beta`.
    pub api_version: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Maximum transport-level retries for gateway errors (502/503/504).
    pub max_retries: u32,
}

impl GraphConfig {
    /// Start building a configuration.
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::default()
    }

    /// The versioned base URL requests are made against.
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            self.api_version
        )
    }
}

/// Builder for [`GraphConfig`].
#[derive(Debug, Default)]
pub struct GraphConfigBuilder {
    endpoint: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl GraphConfigBuilder {
    /// Set the service root endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the API version segment (default: `v1.0`).
    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Set the per-request timeout (default: 30 seconds).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the gateway-error retry budget (default: 3).
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> GraphResult<GraphConfig> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "https://graph.microsoft.com".to_string());
        let endpoint = Url::parse(&endpoint)?;
        if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
            return Err(GraphError::Config(format!(
                "unsupported endpoint scheme '{}'",
                endpoint.scheme()
            )));
        }
        Ok(GraphConfig {
            endpoint,
            api_version: self.api_version.unwrap_or_else(|| "v1.0".to_string()),
            timeout: self.timeout.unwrap_or(Duration::from_secs(30)),
            max_retries: self.max_retries.unwrap_or(3),
        })
    }
}
