//! Single-hop page fetching with referer propagation

use crate::error::{NetworkCause, ResolveError};
use crate::platform::client::{header_value, HttpClientConfig};
use crate::platform::retry::{RetryConfig, RetryExecutor};
use crate::utils::rate_limit::HostRateLimiter;
use crate::utils::url::{host_key, origin_of};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ORIGIN, REFERER};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Headers carried by one hop request
#[derive(Debug, Clone, Default)]
pub struct HopRequest {
    /// URL of the previous hop, or the provider referer for hop 0
    pub referer: Option<Url>,
    /// Extra headers, applied after the defaults
    pub headers: Vec<(String, String)>,
}

impl HopRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_referer(mut self, referer: Option<Url>) -> Self {
        self.referer = referer;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `Origin` derived from the referer
    pub fn origin(&self) -> Option<String> {
        self.referer.as_ref().map(origin_of)
    }
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct HopResult {
    pub hop: usize,
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Referer that was sent
    pub referer: Option<Url>,
}

/// Fetches one page of a hop chain
#[async_trait]
pub trait HopFetcher: Send + Sync {
    async fn fetch(
        &self,
        hop: usize,
        url: &Url,
        request: &HopRequest,
    ) -> Result<HopResult, ResolveError>;
}

/// reqwest-backed [`HopFetcher`] with per-host rate limiting and one transient retry
pub struct HttpHopResolver {
    client: Client,
    limiter: Arc<HostRateLimiter>,
    retry: RetryExecutor,
    max_body_bytes: usize,
}

impl HttpHopResolver {
    pub fn new(
        config: &HttpClientConfig,
        retry: RetryConfig,
        limiter: Arc<HostRateLimiter>,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            client: config.build_client()?,
            limiter,
            retry: RetryExecutor::with_config(retry),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Resolver with default HTTP settings and a permissive limiter
    pub fn with_defaults() -> Result<Self, ResolveError> {
        Self::new(
            &HttpClientConfig::default(),
            RetryConfig::default(),
            Arc::new(HostRateLimiter::new(10, 20)),
        )
    }
}

struct Attempt {
    client: Client,
    limiter: Arc<HostRateLimiter>,
    hop: usize,
    url: Url,
    request: HopRequest,
    max_body_bytes: usize,
}

impl Attempt {
    fn network(&self, cause: NetworkCause) -> ResolveError {
        ResolveError::Network {
            hop: self.hop,
            cause,
        }
    }

    async fn run(self) -> Result<HopResult, ResolveError> {
        self.limiter.acquire(&host_key(&self.url)).await;

        let mut builder = self.client.get(self.url.clone());
        if let Some(referer) = &self.request.referer {
            builder = builder
                .header(REFERER, header_value(referer.as_str())?)
                .header(ORIGIN, header_value(&origin_of(referer))?);
        }
        for (name, value) in &self.request.headers {
            builder = builder.header(name.as_str(), header_value(value)?);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| self.network(NetworkCause::from_reqwest(&e)))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        debug!("Hop {} {} -> {}", self.hop, final_url, status);

        if !status.is_success() {
            return Err(self.network(NetworkCause::Other(format!(
                "HTTP {} from {}",
                status.as_u16(),
                final_url
            ))));
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len as usize > limit) {
            return Err(self.network(NetworkCause::BodyTooLarge { limit }));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.network(NetworkCause::from_reqwest(&e)))?
        {
            if body.len() + chunk.len() > limit {
                return Err(self.network(NetworkCause::BodyTooLarge { limit }));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HopResult {
            hop: self.hop,
            url: final_url,
            status: status.as_u16(),
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
            referer: self.request.referer,
        })
    }
}

#[async_trait]
impl HopFetcher for HttpHopResolver {
    async fn fetch(
        &self,
        hop: usize,
        url: &Url,
        request: &HopRequest,
    ) -> Result<HopResult, ResolveError> {
        self.retry
            .execute(|| {
                let attempt = Attempt {
                    client: self.client.clone(),
                    limiter: self.limiter.clone(),
                    hop,
                    url: url.clone(),
                    request: request.clone(),
                    max_body_bytes: self.max_body_bytes,
                };
                Box::pin(attempt.run())
            })
            .await
    }
}
