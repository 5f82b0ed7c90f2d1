//! # devstate-graph
//!
//! Microsoft Graph-style HTTP transport for the `devstate-core`
//! reconciliation engine.
//!
//! Implements the engine's [`Transport`](devstate_core::Transport) contract
//! over `reqwest`, with OAuth2 client-credentials token caching and a
//! bounded transport-level retry on gateway errors. Classification of
//! error statuses (404/403/429/5xx) stays in the engine.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use devstate_graph::{ClientCredentials, GraphConfig, GraphTransport, TokenCache};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GraphConfig::builder()
//!     .api_version("beta")
//!     .build()?;
//!
//! let credentials = ClientCredentials {
//!     tenant_id: "your-tenant-id".to_string(),
//!     client_id: "your-client-id".to_string(),
//!     client_secret: "your-client-secret".to_string().into(),
//! };
//!
//! let tokens = TokenCache::new(
//!     credentials,
//!     "https://login.microsoftonline.com",
//!     "https://graph.microsoft.com/.default",
//! );
//! let transport = GraphTransport::new(config, Arc::new(tokens))?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod error;

pub use auth::{ClientCredentials, StaticToken, TokenCache, TokenProvider};
pub use client::GraphTransport;
pub use config::{GraphConfig, GraphConfigBuilder};
pub use error::{GraphError, GraphResult};
