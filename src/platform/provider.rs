//! Provider definitions: where a chain starts and which host it relays through

use crate::core::request::{MediaType, ResolutionRequest};
use crate::error::ResolveError;
use crate::utils::url::parse_http_url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// One embed provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Base of the hop 0 embed URL
    pub embed_base: String,
    /// Host that `/rcp/`-style links are rebased onto
    #[serde(default)]
    pub relay_base: Option<String>,
    /// Referer sent with hop 0
    #[serde(default)]
    pub referer: Option<String>,
    /// Codec family used for this provider's tokens; defaults to `name`
    #[serde(default)]
    pub codecs: Option<String>,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_movie_path")]
    pub movie_path: String,
    #[serde(default = "default_tv_path")]
    pub tv_path: String,
}

fn default_max_hops() -> usize {
    6
}

fn default_movie_path() -> String {
    "/embed/movie/{id}".to_string()
}

fn default_tv_path() -> String {
    "/embed/tv/{id}/{season}-{episode}".to_string()
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, embed_base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embed_base: embed_base.into(),
            relay_base: None,
            referer: None,
            codecs: None,
            max_hops: default_max_hops(),
            movie_path: default_movie_path(),
            tv_path: default_tv_path(),
        }
    }

    pub fn with_relay(mut self, relay_base: impl Into<String>) -> Self {
        self.relay_base = Some(relay_base.into());
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Decode with another provider's codecs (for mirrors)
    pub fn with_codecs(mut self, family: impl Into<String>) -> Self {
        self.codecs = Some(family.into());
        self
    }

    pub fn codec_family(&self) -> &str {
        self.codecs.as_deref().unwrap_or(&self.name)
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Hop 0 URL for a request
    pub fn embed_url(&self, request: &ResolutionRequest) -> Result<Url, ResolveError> {
        let path = match request.media_type() {
            MediaType::Movie => self.movie_path.replace("{id}", request.content_id()),
            MediaType::Tv => {
                let (season, episode) = request.season_episode().ok_or_else(|| {
                    ResolveError::InvalidRequest("tv request without season/episode".to_string())
                })?;
                self.tv_path
                    .replace("{id}", request.content_id())
                    .replace("{season}", &season.to_string())
                    .replace("{episode}", &episode.to_string())
            }
        };

        let base = parse_http_url(&self.embed_base)?;
        Ok(base.join(&path)?)
    }

    pub fn relay(&self) -> Result<Option<Url>, ResolveError> {
        self.relay_base.as_deref().map(parse_http_url).transpose()
    }

    pub fn referer_url(&self) -> Result<Option<Url>, ResolveError> {
        self.referer.as_deref().map(parse_http_url).transpose()
    }

    fn validate(&self) -> Result<(), ResolveError> {
        if self.name.trim().is_empty() {
            return Err(ResolveError::Config("provider name is empty".to_string()));
        }
        if self.max_hops == 0 {
            return Err(ResolveError::Config(format!(
                "provider {} allows zero hops",
                self.name
            )));
        }
        parse_http_url(&self.embed_base)
            .map_err(|e| ResolveError::Config(format!("provider {}: {}", self.name, e)))?;
        self.relay()
            .map_err(|e| ResolveError::Config(format!("provider {}: {}", self.name, e)))?;
        Ok(())
    }
}

/// Providers known to the resolver, keyed by lowercase name
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers that ship with the crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let vidsrc = ProviderConfig::new(crate::codec::builtin::VIDSRC, "https://vidsrc.xyz")
            .with_relay("https://cloudnestra.com");
        registry.providers.insert(vidsrc.name.clone(), vidsrc);
        registry.default_provider = Some(crate::codec::builtin::VIDSRC.to_string());
        registry
    }

    /// Add or replace a provider; the first one registered becomes the default
    pub fn register(&mut self, provider: ProviderConfig) -> Result<(), ResolveError> {
        provider.validate()?;
        let key = provider.name.to_ascii_lowercase();
        if self.default_provider.is_none() {
            self.default_provider = Some(key.clone());
        }
        self.providers.insert(key, provider);
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), ResolveError> {
        let key = name.to_ascii_lowercase();
        if !self.providers.contains_key(&key) {
            return Err(ResolveError::UnknownProvider(name.to_string()));
        }
        self.default_provider = Some(key);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(&name.to_ascii_lowercase())
    }

    /// Provider named by the hint, or the default one
    pub fn select(&self, hint: Option<&str>) -> Result<&ProviderConfig, ResolveError> {
        let name = match hint {
            Some(hint) => hint.to_string(),
            None => self
                .default_provider
                .clone()
                .ok_or_else(|| ResolveError::UnknownProvider("(none registered)".to_string()))?,
        };
        self.get(&name)
            .ok_or(ResolveError::UnknownProvider(name))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
