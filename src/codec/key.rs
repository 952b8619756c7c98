//! Key derivation from token context.
//!
//! Pure functions only: identical inputs always give identical keys.

use crate::core::token::TokenContext;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("context field {0} is missing")]
    MissingContext(&'static str),

    #[error("derived key is empty")]
    Empty,

    #[error("key derivation unconfirmed: {0}")]
    Unconfirmed(String),
}

/// Digest used by hash-based strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgo {
    /// Raw 16-byte MD5 digest
    Md5,
    /// Raw 32-byte SHA-256 digest
    Sha256,
    /// Lowercase hex of the MD5 digest, as ASCII bytes
    Md5Hex,
    /// Lowercase hex of the SHA-256 digest, as ASCII bytes
    Sha256Hex,
}

impl HashAlgo {
    pub fn digest(&self, input: &[u8]) -> Vec<u8> {
        match self {
            HashAlgo::Md5 => Md5::digest(input).to_vec(),
            HashAlgo::Sha256 => Sha256::digest(input).to_vec(),
            HashAlgo::Md5Hex => hex::encode(Md5::digest(input)).into_bytes(),
            HashAlgo::Sha256Hex => hex::encode(Sha256::digest(input)).into_bytes(),
        }
    }
}

/// Key from a context string.
///
/// `normalize` keeps only ASCII alphanumerics and uppercases them. `last_n`
/// keeps the trailing N characters. `length` repeats or truncates the result
/// to exactly that many bytes.
pub fn static_context(
    ctx: &str,
    normalize: bool,
    last_n: Option<usize>,
    length: Option<usize>,
) -> Vec<u8> {
    let mut chars: Vec<char> = if normalize {
        ctx.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    } else {
        ctx.chars().collect()
    };

    if let Some(n) = last_n {
        if chars.len() > n {
            chars.drain(..chars.len() - n);
        }
    }

    let base = chars.into_iter().collect::<String>().into_bytes();
    match length {
        Some(len) if !base.is_empty() => base.iter().cycle().take(len).copied().collect(),
        Some(_) => Vec::new(),
        None => base,
    }
}

/// Digest of a context string, used directly as key bytes
pub fn derived_hash(ctx: &str, algo: HashAlgo) -> Vec<u8> {
    algo.digest(ctx.as_bytes())
}

/// Join ordered context fields with `delimiter`, then hash
pub fn composite_fingerprint<S: AsRef<str>>(parts: &[S], delimiter: &str, algo: HashAlgo) -> Vec<u8> {
    let joined = parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<_>>()
        .join(delimiter);
    algo.digest(joined.as_bytes())
}

/// Which context value feeds a key strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ContextField {
    DivId,
    EmbedId,
    /// Last non-empty segment of the embed path
    EmbedPathSegment,
    PageUrl,
    Literal(String),
}

impl ContextField {
    fn resolve<'a>(&'a self, ctx: &'a TokenContext) -> Result<&'a str, KeyError> {
        match self {
            ContextField::DivId => ctx.div_id.as_deref().ok_or(KeyError::MissingContext("div_id")),
            ContextField::EmbedId => ctx
                .embed_id
                .as_deref()
                .ok_or(KeyError::MissingContext("embed_id")),
            ContextField::EmbedPathSegment => ctx
                .embed_path
                .as_deref()
                .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
                .ok_or(KeyError::MissingContext("embed_path")),
            ContextField::PageUrl => Ok(ctx.page_url.as_str()),
            ContextField::Literal(value) => Ok(value.as_str()),
        }
    }
}

/// How a codec obtains its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Chain needs no key
    None,
    /// Fixed key bytes taken from the provider's player script
    Literal { key: String },
    StaticContext {
        field: ContextField,
        #[serde(default)]
        normalize: bool,
        #[serde(default)]
        last_n: Option<usize>,
        #[serde(default)]
        length: Option<usize>,
    },
    DerivedHash { field: ContextField, algo: HashAlgo },
    /// Hash of caller-supplied fingerprint parts, in order
    CompositeFingerprint { delimiter: String, algo: HashAlgo },
    /// Provider whose key formula has not been confirmed
    Unconfirmed { reason: String },
}

impl KeyStrategy {
    /// Derive the key for one token
    pub fn derive(&self, ctx: &TokenContext) -> Result<Vec<u8>, KeyError> {
        let key = match self {
            KeyStrategy::None => return Ok(Vec::new()),
            KeyStrategy::Literal { key } => key.as_bytes().to_vec(),
            KeyStrategy::StaticContext {
                field,
                normalize,
                last_n,
                length,
            } => static_context(field.resolve(ctx)?, *normalize, *last_n, *length),
            KeyStrategy::DerivedHash { field, algo } => derived_hash(field.resolve(ctx)?, *algo),
            KeyStrategy::CompositeFingerprint { delimiter, algo } => {
                if ctx.fingerprint.is_empty() {
                    return Err(KeyError::MissingContext("fingerprint"));
                }
                composite_fingerprint(&ctx.fingerprint, delimiter, *algo)
            }
            KeyStrategy::Unconfirmed { reason } => {
                return Err(KeyError::Unconfirmed(reason.clone()))
            }
        };

        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(div_id: &str) -> TokenContext {
        TokenContext {
            div_id: Some(div_id.to_string()),
            embed_id: Some("tt0944947".to_string()),
            embed_path: Some("/prorcp/OGE2ZjBkYjU/".to_string()),
            page_url: "https://cloudnestra.com/prorcp/OGE2ZjBkYjU".to_string(),
            fingerprint: Vec::new(),
        }
    }

    #[test]
    fn test_static_context_plain() {
        assert_eq!(static_context("TsA2KGDGux", false, None, None), b"TsA2KGDGux".to_vec());
    }

    #[test]
    fn test_static_context_normalize_slice_repeat() {
        assert_eq!(static_context("ab-c_d9", true, None, None), b"ABCD9".to_vec());
        assert_eq!(static_context("ab-c_d9", true, Some(3), None), b"CD9".to_vec());
        assert_eq!(static_context("xyz", false, None, Some(7)), b"xyzxyzx".to_vec());
        assert_eq!(static_context("abcdef", false, None, Some(2)), b"ab".to_vec());
        assert!(static_context("", false, None, Some(4)).is_empty());
    }

    #[test]
    fn test_derivations_are_deterministic() {
        let context = ctx("TsA2KGDGux");
        let strategies = vec![
            KeyStrategy::StaticContext {
                field: ContextField::DivId,
                normalize: true,
                last_n: Some(8),
                length: Some(32),
            },
            KeyStrategy::DerivedHash {
                field: ContextField::EmbedId,
                algo: HashAlgo::Sha256,
            },
            KeyStrategy::DerivedHash {
                field: ContextField::EmbedPathSegment,
                algo: HashAlgo::Md5Hex,
            },
        ];
        for strategy in &strategies {
            assert_eq!(strategy.derive(&context), strategy.derive(&context));
        }
    }

    #[test]
    fn test_derived_hash_lengths_and_known_value() {
        assert_eq!(derived_hash("abc", HashAlgo::Md5).len(), 16);
        assert_eq!(derived_hash("abc", HashAlgo::Sha256).len(), 32);
        assert_eq!(
            derived_hash("abc", HashAlgo::Md5Hex),
            b"900150983cd24fb0d6963f7d28e17f72".to_vec()
        );
    }

    #[test]
    fn test_composite_fingerprint_order_matters() {
        let a = composite_fingerprint(&["ua", "canvas", "1700000000"], "|", HashAlgo::Sha256);
        let b = composite_fingerprint(&["canvas", "ua", "1700000000"], "|", HashAlgo::Sha256);
        assert_ne!(a, b);
        assert_eq!(
            a,
            composite_fingerprint(&["ua", "canvas", "1700000000"], "|", HashAlgo::Sha256)
        );
    }

    #[test]
    fn test_embed_path_segment_field() {
        let key = KeyStrategy::StaticContext {
            field: ContextField::EmbedPathSegment,
            normalize: false,
            last_n: None,
            length: None,
        }
        .derive(&ctx("x"))
        .unwrap();
        assert_eq!(key, b"OGE2ZjBkYjU".to_vec());
    }

    #[test]
    fn test_missing_and_unconfirmed() {
        let mut context = ctx("x");
        context.div_id = None;

        let div = KeyStrategy::StaticContext {
            field: ContextField::DivId,
            normalize: false,
            last_n: None,
            length: None,
        };
        assert_eq!(div.derive(&context), Err(KeyError::MissingContext("div_id")));

        let fingerprint = KeyStrategy::CompositeFingerprint {
            delimiter: "|".to_string(),
            algo: HashAlgo::Sha256,
        };
        assert_eq!(
            fingerprint.derive(&context),
            Err(KeyError::MissingContext("fingerprint"))
        );

        context.fingerprint = vec!["a".to_string(), "b".to_string()];
        assert_eq!(fingerprint.derive(&context).unwrap().len(), 32);

        let unconfirmed = KeyStrategy::Unconfirmed {
            reason: "canvas hash".to_string(),
        };
        assert!(matches!(
            unconfirmed.derive(&context),
            Err(KeyError::Unconfirmed(_))
        ));
        assert_eq!(KeyStrategy::None.derive(&context), Ok(Vec::new()));
    }

    #[test]
    fn test_normalize_to_empty_is_error() {
        let strategy = KeyStrategy::StaticContext {
            field: ContextField::Literal("--__".to_string()),
            normalize: true,
            last_n: None,
            length: Some(8),
        };
        assert_eq!(strategy.derive(&ctx("x")), Err(KeyError::Empty));
    }
}
