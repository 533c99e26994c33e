//! DVBViewer API Client
//!
//! HTTP client for the recording service web API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;

/// Query arguments in request order
pub type Query = [(&'static str, String)];

/// Transport seam used by every cache and mutation
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// GET `path` and return the raw body
    async fn fetch(
        &self,
        path: &str,
        query: &Query,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<u8>>;

    /// GET `path` for its side effect only
    async fn send(
        &self,
        path: &str,
        query: &Query,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        self.fetch(path, query, cancel).await.map(|_| ())
    }
}

/// Turns backend-relative logo paths into absolute URLs
pub trait ImageUrlResolver: Send + Sync {
    fn channel_logo(&self, logo_ref: &str) -> Option<String>;
}

/// DVBViewer API Client
pub struct DvbViewerClient {
    http: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
    user_agent: String,
}

impl DvbViewerClient {
    /// Create a new client from configuration
    pub fn new(config: &Config) -> ServiceResult<Self> {
        let base_url = Url::parse(&config.api_base_url())
            .map_err(|e| ServiceError::InvalidRequest(format!("invalid backend url: {}", e)))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .gzip(true)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            user_agent: config.user_agent.clone(),
        })
    }

    fn build_url(&self, path: &str, query: &Query) -> ServiceResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ServiceError::InvalidRequest(format!("{}: {}", path, e)))?;

        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(url)
    }
}

/// "api/timerlist.html" -> "timerlist"
fn endpoint_label(path: &str) -> &str {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".html")
}

#[async_trait]
impl RemoteApi for DvbViewerClient {
    async fn fetch(
        &self,
        path: &str,
        query: &Query,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<u8>> {
        let url = self.build_url(path, query)?;
        let endpoint = endpoint_label(path);

        debug!("DVBViewer API request: {}", endpoint);

        let mut request = self
            .http
            .get(url)
            .header("User-Agent", self.user_agent.as_str());
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        // Dropping the request future aborts the connection
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics::record_request(endpoint, "cancelled");
                return Err(ServiceError::Cancelled);
            }
            result = request.send() => result.map_err(|e| {
                metrics::record_request(endpoint, "network");
                warn!(endpoint, "DVBViewer request failed: {}", e);
                ServiceError::Network(e.to_string())
            })?,
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            metrics::record_request(endpoint, "unauthorized");
            error!(endpoint, "DVBViewer rejected credentials");
            return Err(ServiceError::Authentication);
        }
        if !status.is_success() {
            metrics::record_request(endpoint, "http_error");
            return Err(ServiceError::Http(status.as_u16()));
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics::record_request(endpoint, "cancelled");
                return Err(ServiceError::Cancelled);
            }
            result = response.bytes() => result.map_err(|e| {
                metrics::record_request(endpoint, "network");
                ServiceError::Network(e.to_string())
            })?,
        };

        metrics::record_request(endpoint, "ok");
        Ok(body.to_vec())
    }
}

impl ImageUrlResolver for DvbViewerClient {
    fn channel_logo(&self, logo_ref: &str) -> Option<String> {
        let logo_ref = logo_ref.trim().replace('\\', "/");
        if logo_ref.is_empty() {
            return None;
        }

        let mut url = self.base_url.join("api/").ok()?.join(&logo_ref).ok()?;
        if let Some((user, pass)) = &self.credentials {
            // Players fetch logos directly, so the credentials travel in the URL
            url.set_username(user).ok()?;
            url.set_password(Some(pass)).ok()?;
        }
        Some(url.to_string())
    }
}
