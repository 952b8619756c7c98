//! Codec backed by an external decrypt service

use crate::codec::strategy::{ContextSelector, Decoder};
use crate::core::token::TokenContext;
use crate::error::{DecodeError, ResolveError};
use crate::utils::cache::TtlCache;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::redact::redact;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Remote decrypt endpoint as declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCodecConfig {
    pub id: String,
    pub endpoint: String,
    /// Optional key forwarded with every request
    #[serde(default)]
    pub key: Option<String>,
    /// Provider this codec belongs to; `None` registers it as a fallback
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub div_ids: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_priority() -> i32 {
    100
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    600
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
}

#[derive(Deserialize)]
struct DecryptResponse {
    result: String,
}

/// POSTs `{text, key?}` and reads `{result}`.
///
/// Any transport, status or body failure becomes a [`DecodeError`], so the
/// registry treats it like a local codec that did not match.
pub struct RemoteCodec<C: Clock = SystemClock> {
    id: String,
    endpoint: Url,
    key: Option<String>,
    selector: ContextSelector,
    client: Client,
    cache: TtlCache<String, String, C>,
}

impl RemoteCodec<SystemClock> {
    pub fn from_config(config: &RemoteCodecConfig) -> Result<Self, ResolveError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RemoteCodec<C> {
    pub fn with_clock(config: &RemoteCodecConfig, clock: C) -> Result<Self, ResolveError> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ResolveError::Config(format!("remote codec {}: {}", config.id, e)))?;

        let selector = if config.div_ids.is_empty() {
            ContextSelector::Any
        } else {
            ContextSelector::DivIds {
                ids: config.div_ids.clone(),
            }
        };

        Ok(Self {
            id: config.id.clone(),
            endpoint,
            key: config.key.clone(),
            selector,
            client,
            cache: TtlCache::with_clock(Duration::from_secs(config.cache_ttl_secs), clock),
        })
    }

    fn fail(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::new(self.id.clone(), reason)
    }

    fn cache_key(&self, token: &str) -> String {
        format!("{}\u{0}{}", self.key.as_deref().unwrap_or_default(), token)
    }

    async fn request(&self, token: &str) -> Result<String, DecodeError> {
        let body = DecryptRequest {
            text: token,
            key: self.key.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.fail(format!("decrypt service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Decrypt service {} returned {}", self.endpoint, status);
            return Err(self.fail(format!("decrypt service returned {}", status.as_u16())));
        }

        let parsed: DecryptResponse = response
            .json()
            .await
            .map_err(|e| self.fail(format!("invalid decrypt response: {}", e)))?;
        Ok(parsed.result)
    }
}

#[async_trait]
impl<C: Clock> Decoder for RemoteCodec<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn accepts(&self, ctx: &TokenContext) -> bool {
        self.selector.matches(ctx)
    }

    async fn decode(&self, token: &str, _ctx: &TokenContext) -> Result<String, DecodeError> {
        let cache_key = self.cache_key(token);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Decrypt cache hit for {}", redact(token));
            return Ok(cached);
        }

        let result = self.request(token).await?;
        // expired tokens are never looked up again
        self.cache.cleanup_expired();
        self.cache.insert(cache_key, result.clone());
        Ok(result)
    }
}
