//! Resolver configuration: defaults, JSON file, then caller overrides

use crate::codec::builtin::register_builtin;
use crate::codec::registry::CodecRegistry;
use crate::codec::remote::{RemoteCodec, RemoteCodecConfig};
use crate::error::ResolveError;
use crate::platform::client::HttpClientConfig;
use crate::platform::provider::{ProviderConfig, ProviderRegistry};
use crate::platform::retry::RetryConfig;
use crate::utils::rate_limit::HostRateLimiter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Per-host request budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 5,
            burst: 10,
        }
    }
}

impl RateLimitConfig {
    pub fn build(&self) -> HostRateLimiter {
        HostRateLimiter::new(self.per_second, self.burst)
    }
}

/// Everything the resolver needs besides its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub http: HttpClientConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    /// Overall budget for one resolution
    #[serde(with = "crate::utils::duration")]
    pub deadline: Duration,
    pub max_concurrent_requests: usize,
    /// Shortest hidden-div text accepted as a token
    pub min_token_length: usize,
    /// Added to (or replacing) the built-in providers
    pub providers: Vec<ProviderConfig>,
    pub default_provider: Option<String>,
    pub remote_codecs: Vec<RemoteCodecConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            deadline: Duration::from_secs(45),
            max_concurrent_requests: 8,
            min_token_length: 16,
            providers: Vec::new(),
            default_provider: None,
            remote_codecs: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ResolveError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.max_concurrent_requests == 0 {
            return Err(ResolveError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.deadline.is_zero() {
            return Err(ResolveError::Config("deadline must be positive".to_string()));
        }
        if self.http.timeout.is_zero() {
            return Err(ResolveError::Config("http timeout must be positive".to_string()));
        }
        self.retry.validate()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.http.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.http.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, per_second: u32, burst: u32) -> Self {
        self.rate_limit = RateLimitConfig { per_second, burst };
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit;
        self
    }

    pub fn with_min_token_length(mut self, length: usize) -> Self {
        self.min_token_length = length;
        self
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    pub fn with_remote_codec(mut self, codec: RemoteCodecConfig) -> Self {
        self.remote_codecs.push(codec);
        self
    }

    /// Built-in providers overlaid with the configured ones
    pub fn provider_registry(&self) -> Result<ProviderRegistry, ResolveError> {
        let mut registry = ProviderRegistry::builtin();
        for provider in &self.providers {
            debug!("Registering provider {}", provider.name);
            registry.register(provider.clone())?;
        }
        if let Some(name) = &self.default_provider {
            registry.set_default(name)?;
        }
        Ok(registry)
    }

    /// Built-in codecs plus configured remote decrypt endpoints
    pub fn codec_registry(&self) -> Result<CodecRegistry, ResolveError> {
        let mut builder = register_builtin(CodecRegistry::builder());

        for remote in &self.remote_codecs {
            let codec = Arc::new(RemoteCodec::from_config(remote)?);
            builder = match &remote.provider {
                Some(provider) => builder.register_arc(provider, remote.priority, codec),
                None => builder.fallback(remote.priority, codec),
            };
        }

        Ok(builder.build())
    }
}
