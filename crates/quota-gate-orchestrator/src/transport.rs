// crates/quota-gate-orchestrator/src/transport.rs
// ============================================================================
// Module: Discovery Transport
// Description: Network boundary for parameterized event searches.
// Purpose: Classify failures structurally and guard the upstream URL.
// Dependencies: async-trait, quota-gate-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`SearchTransport`] is the single outbound call type: a search against an
//! endpoint with canonical parameters, returning the opaque JSON payload.
//! Failures are typed at the source: a request that never reached the
//! server is [`TransportError::Connectivity`], a non-success status is
//! [`TransportError::Upstream`], and an unreadable body is
//! [`TransportError::MalformedResponse`].
//!
//! [`DiscoveryClient`] refuses to dispatch to any URL outside the configured
//! allowed prefix, appends the API key as the `apikey` query parameter, and
//! reads bodies under a hard byte limit. The key never appears in errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use quota_gate_config::ConfigError;
use quota_gate_config::UpstreamConfig;
use quota_gate_core::EndpointId;
use quota_gate_core::RequestParams;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Query parameter carrying the API key.
const API_KEY_PARAM: &str = "apikey";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structurally classified transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never reached the server or was aborted.
    #[error("connectivity failure: {0}")]
    Connectivity(String),
    /// The server answered with a non-success status.
    #[error("upstream returned http status {status}")]
    Upstream {
        /// HTTP status code.
        status: u16,
    },
    /// The server answered but the body was unusable.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
    /// The request was refused locally before dispatch.
    #[error("request refused: {0}")]
    Refused(String),
}

impl TransportError {
    /// Returns a stable label for the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "connectivity",
            Self::Upstream {
                ..
            } => "upstream",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Refused(_) => "refused",
        }
    }

    /// Returns the upstream status when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream {
                status,
            } => Some(*status),
            Self::Connectivity(_) | Self::MalformedResponse(_) | Self::Refused(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Outbound search call.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Performs one search and returns the payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] classified by failure kind.
    async fn search(
        &self,
        endpoint_id: &EndpointId,
        params: &RequestParams,
    ) -> Result<Value, TransportError>;
}

// ============================================================================
// SECTION: Discovery Client
// ============================================================================

/// Discovery client settings.
#[derive(Clone)]
pub struct DiscoveryClientConfig {
    /// Base URL endpoints are appended to.
    pub base_url: String,
    /// Prefix every dispatched URL must start with.
    pub allowed_prefix: String,
    /// API key appended as a query parameter.
    pub api_key: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Maximum accepted body size in bytes.
    pub max_response_bytes: usize,
    /// User agent header.
    pub user_agent: String,
}

impl fmt::Debug for DiscoveryClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryClientConfig")
            .field("base_url", &self.base_url)
            .field("allowed_prefix", &self.allowed_prefix)
            .field("api_key", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl DiscoveryClientConfig {
    /// Builds client settings from the `[upstream]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no API key can be resolved.
    pub fn from_upstream(upstream: &UpstreamConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: upstream.base_url.clone(),
            allowed_prefix: upstream.allowed_prefix.clone(),
            api_key: upstream.resolve_api_key()?,
            connect_timeout: Duration::from_millis(upstream.connect_timeout_ms),
            request_timeout: Duration::from_millis(upstream.request_timeout_ms),
            max_response_bytes: upstream.max_response_bytes,
            user_agent: upstream.user_agent.clone(),
        })
    }
}

/// HTTP client for the upstream discovery API.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    /// Client settings.
    config: DiscoveryClientConfig,
    /// Shared HTTP client.
    client: Client,
}

impl DiscoveryClient {
    /// Creates a client, refusing a base URL outside the allowed prefix.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Refused`] when the settings are unusable.
    pub fn new(config: DiscoveryClientConfig) -> Result<Self, TransportError> {
        let probe = endpoint_url(&config.base_url, "")?;
        guard_prefix(&probe, &config.allowed_prefix)?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| TransportError::Refused("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Builds the dispatch URL for a request, without the API key.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Refused`] when the URL leaves the allowed prefix.
    pub fn request_url(
        &self,
        endpoint_id: &EndpointId,
        params: &RequestParams,
    ) -> Result<Url, TransportError> {
        let mut url = endpoint_url(&self.config.base_url, endpoint_id.as_str())?;
        guard_prefix(&url, &self.config.allowed_prefix)?;
        let pairs = params.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

#[async_trait]
impl SearchTransport for DiscoveryClient {
    async fn search(
        &self,
        endpoint_id: &EndpointId,
        params: &RequestParams,
    ) -> Result<Value, TransportError> {
        let mut url = self.request_url(endpoint_id, params)?;
        url.query_pairs_mut().append_pair(API_KEY_PARAM, &self.config.api_key);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| TransportError::Connectivity(err.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Upstream {
                status: status.as_u16(),
            });
        }
        let body = read_response_body_with_limit(response, self.config.max_response_bytes).await?;
        serde_json::from_slice(&body)
            .map_err(|err| TransportError::MalformedResponse(format!("invalid json: {err}")))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins the base URL and an endpoint path.
fn endpoint_url(base_url: &str, endpoint: &str) -> Result<Url, TransportError> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'));
    Url::parse(&joined).map_err(|_| TransportError::Refused("invalid upstream url".to_string()))
}

/// Rejects URLs outside the allowed prefix.
fn guard_prefix(url: &Url, allowed_prefix: &str) -> Result<(), TransportError> {
    if allowed_prefix.is_empty() || !url.as_str().starts_with(allowed_prefix) {
        return Err(TransportError::Refused("url outside allowed upstream prefix".to_string()));
    }
    Ok(())
}

/// Reads a response body while enforcing a hard byte limit.
async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| TransportError::Connectivity(err.without_url().to_string()))?
    {
        let next_total = body.len().saturating_add(chunk.len());
        if next_total > limit {
            return Err(TransportError::MalformedResponse(format!(
                "response exceeds size limit ({next_total} > {limit})"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
