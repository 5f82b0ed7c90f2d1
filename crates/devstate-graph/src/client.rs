//! HTTP implementation of the engine's transport contract.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use devstate_core::transport::{
    Method, Transport, TransportFailure, WireRequest, WireResponse,
};

use crate::auth::TokenProvider;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};

/// `reqwest`-backed transport for a Graph-style service.
///
/// Owns transport-level concerns only: token injection, URL assembly, and a
/// bounded retry on gateway errors (502/503/504). Every other status,
/// including 429, passes through unchanged so the engine's classifier can
/// turn it into the right outcome.
pub struct GraphTransport {
    http_client: reqwest::Client,
    config: GraphConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphTransport {
    /// Creates a transport from a configuration and token source.
    pub fn new(config: GraphConfig, tokens: Arc<dyn TokenProvider>) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
            tokens,
        })
    }

    /// The versioned base URL requests are made against.
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// Assemble the absolute URL for a request path.
    ///
    /// Paging next-links arrive absolute and are used as-is; everything
    /// else is joined onto the versioned base.
    fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}/{}", self.base_url(), path)
        }
    }

    fn reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    async fn execute_once(&self, request: &WireRequest) -> Result<WireResponse, TransportFailure> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| TransportFailure::new(e.to_string()))?;

        let url = self.absolute_url(&request.path);
        let mut builder = self
            .http_client
            .request(Self::reqwest_method(request.method), &url)
            .bearer_auth(&token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportFailure::new(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::new(e.to_string()))?;

        Ok(WireResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[async_trait]
impl Transport for GraphTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure> {
        let mut retries = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            debug!(method = %request.method, path = %request.path, "sending request");
            let response = self.execute_once(&request).await?;

            // Gateway errors are retried here with exponential backoff;
            // everything else is the classifier's business.
            if matches!(response.status, 502 | 503 | 504) && retries < self.config.max_retries {
                retries += 1;
                warn!(
                    "Gateway error {}, retry {}/{} after {:?}",
                    response.status, retries, self.config.max_retries, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            return Ok(response);
        }
    }
}
