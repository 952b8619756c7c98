//! Declarative token codecs

use crate::codec::key::KeyStrategy;
use crate::codec::transform::Transform;
use crate::core::token::TokenContext;
use crate::error::DecodeError;
use crate::utils::redact::Redacted;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A decode strategy the registry can try against a token
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Stable identifier reported in decode attempts
    fn id(&self) -> &str;

    /// Whether this decoder applies to tokens carrying `ctx`
    fn accepts(&self, _ctx: &TokenContext) -> bool {
        true
    }

    /// Decode `token` into text; validation happens in the registry
    async fn decode(&self, token: &str, ctx: &TokenContext) -> Result<String, DecodeError>;
}

/// Restricts a codec to tokens from particular hidden elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextSelector {
    #[default]
    Any,
    DivIds { ids: Vec<String> },
}

impl ContextSelector {
    pub fn matches(&self, ctx: &TokenContext) -> bool {
        match self {
            ContextSelector::Any => true,
            ContextSelector::DivIds { ids } => ctx
                .div_id
                .as_deref()
                .map(|div_id| ids.iter().any(|id| id == div_id))
                .unwrap_or(false),
        }
    }
}

/// Key strategy plus an ordered transform chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub id: String,
    pub key: KeyStrategy,
    pub chain: Vec<Transform>,
    #[serde(default)]
    pub selector: ContextSelector,
}

impl Codec {
    pub fn new(id: impl Into<String>, key: KeyStrategy, chain: Vec<Transform>) -> Self {
        Self {
            id: id.into(),
            key,
            chain,
            selector: ContextSelector::Any,
        }
    }

    /// Restrict the codec to the given div ids
    pub fn for_div_ids(mut self, ids: &[&str]) -> Self {
        self.selector = ContextSelector::DivIds {
            ids: ids.iter().map(|id| id.to_string()).collect(),
        };
        self
    }

    fn fail(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::new(self.id.clone(), reason)
    }

    /// Derive the key once, then run the chain in declared order
    pub fn decode_text(&self, token: &str, ctx: &TokenContext) -> Result<String, DecodeError> {
        let key = self
            .key
            .derive(ctx)
            .map_err(|e| self.fail(e.to_string()))?;
        trace!("Codec {} derived key {}", self.id, String::from_utf8_lossy(&key));

        let mut buffer = token.trim().as_bytes().to_vec();
        for step in &self.chain {
            buffer = step
                .apply(&buffer, &key)
                .map_err(|e| self.fail(format!("{}: {}", step.name(), e)))?;
        }

        let output =
            String::from_utf8(buffer).map_err(|_| self.fail("output is not valid UTF-8"))?;
        debug!(
            "Codec {} produced {} from key {}",
            self.id,
            Redacted::str(&output),
            Redacted(&key)
        );
        Ok(output)
    }

    /// Build a token that this codec decodes back to `plaintext`
    pub fn encode_text(&self, plaintext: &str, ctx: &TokenContext) -> Result<String, DecodeError> {
        let key = self
            .key
            .derive(ctx)
            .map_err(|e| self.fail(e.to_string()))?;

        let mut buffer = plaintext.as_bytes().to_vec();
        for step in self.chain.iter().rev() {
            buffer = step
                .invert(&buffer, &key)
                .map_err(|e| self.fail(format!("{}: {}", step.name(), e)))?;
        }

        String::from_utf8(buffer).map_err(|_| self.fail("encoded token is not valid UTF-8"))
    }
}

#[async_trait]
impl Decoder for Codec {
    fn id(&self) -> &str {
        &self.id
    }

    fn accepts(&self, ctx: &TokenContext) -> bool {
        self.selector.matches(ctx)
    }

    async fn decode(&self, token: &str, ctx: &TokenContext) -> Result<String, DecodeError> {
        self.decode_text(token, ctx)
    }
}
