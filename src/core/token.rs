//! Extracted tokens and their decoding context

use crate::utils::redact::redact;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Values found next to a token that key strategies may draw on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContext {
    /// Id of the hidden element that carried the token
    pub div_id: Option<String>,
    /// Content id of the originating embed
    pub embed_id: Option<String>,
    /// Path of the page the token came from
    pub embed_path: Option<String>,
    /// Full URL of the page the token came from
    pub page_url: String,
    /// Caller-supplied client fingerprint fields, in order
    #[serde(default)]
    pub fingerprint: Vec<String>,
}

impl TokenContext {
    pub fn for_page(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            ..Self::default()
        }
    }

    pub fn with_div_id(mut self, div_id: impl Into<String>) -> Self {
        self.div_id = Some(div_id.into());
        self
    }

    pub fn with_embed_id(mut self, embed_id: impl Into<String>) -> Self {
        self.embed_id = Some(embed_id.into());
        self
    }

    pub fn with_fingerprint(mut self, parts: Vec<String>) -> Self {
        self.fingerprint = parts;
        self
    }
}

/// Opaque encoded string pulled from a terminal page
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    raw: String,
    hop: usize,
    context: TokenContext,
}

impl Token {
    pub fn new(raw: impl Into<String>, hop: usize, context: TokenContext) -> Self {
        Self {
            raw: raw.into(),
            hop,
            context,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Index of the hop whose page carried the token
    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn context(&self) -> &TokenContext {
        &self.context
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("raw", &redact(&self.raw))
            .field("hop", &self.hop)
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_redacts_raw_token() {
        let token = Token::new(
            "=0je4I3M3pWe4Zmc0YkRWZ0R",
            2,
            TokenContext::for_page("https://cloudnestra.com/prorcp/x").with_div_id("TsA2KGDGux"),
        );
        let shown = format!("{:?}", token);
        assert!(shown.contains("len=24"));
        assert!(!shown.contains("M3pWe4Zmc"));
        assert_eq!(token.hop(), 2);
        assert_eq!(token.context().div_id.as_deref(), Some("TsA2KGDGux"));
    }
}
