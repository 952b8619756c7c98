//! Error types for vidhop

use std::fmt;
use thiserror::Error;

/// Why a hop fetch failed at the transport level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCause {
    /// Per-hop timeout elapsed
    Timeout,
    /// TCP/TLS connection could not be established
    Connect,
    /// Connection reset or closed mid-response
    Reset,
    /// Response body exceeded the configured cap
    BodyTooLarge { limit: usize },
    /// Anything else reported by the HTTP stack
    Other(String),
}

impl NetworkCause {
    /// Transient causes are retried exactly once by the hop resolver
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkCause::Timeout | NetworkCause::Connect | NetworkCause::Reset
        )
    }

    /// Classify a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return NetworkCause::Timeout;
        }
        if err.is_connect() {
            return NetworkCause::Connect;
        }

        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            if let Some(io) = inner.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof => return NetworkCause::Reset,
                    std::io::ErrorKind::TimedOut => return NetworkCause::Timeout,
                    _ => {}
                }
            }
            if inner.to_string().contains("connection closed") {
                return NetworkCause::Reset;
            }
            source = inner.source();
        }

        NetworkCause::Other(err.to_string())
    }
}

impl fmt::Display for NetworkCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkCause::Timeout => write!(f, "timed out"),
            NetworkCause::Connect => write!(f, "connection failed"),
            NetworkCause::Reset => write!(f, "connection reset"),
            NetworkCause::BodyTooLarge { limit } => {
                write!(f, "response body exceeds {} bytes", limit)
            }
            NetworkCause::Other(message) => write!(f, "{}", message),
        }
    }
}

/// Why a resolution was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled the request
    Caller,
    /// The overall pipeline deadline expired
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Caller => write!(f, "cancelled by caller"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

/// A single codec failed to produce a valid stream URL.
///
/// This is never fatal on its own: the registry moves on to the next codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("codec {codec} failed: {reason}")]
pub struct DecodeError {
    pub codec: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(codec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            reason: reason.into(),
        }
    }
}

/// Main error type for vidhop operations
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Network error at hop {hop}: {cause}")]
    Network { hop: usize, cause: NetworkCause },

    #[error("No token or next-hop link found at hop {hop}")]
    Extraction { hop: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("All {attempts} decode attempts failed validation")]
    DecodeExhausted { attempts: usize },

    #[error("Resolution {0}")]
    Cancelled(CancelReason),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ResolveError {
    /// Check if the error is a transient network failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Network { cause, .. } if cause.is_transient())
    }

    /// Check if the error ends a resolution
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ResolveError::Decode(_))
    }

    /// Hop index the error is attributed to, if any
    pub fn hop(&self) -> Option<usize> {
        match self {
            ResolveError::Network { hop, .. } | ResolveError::Extraction { hop } => Some(*hop),
            _ => None,
        }
    }

    /// Stable machine-readable code used by the inbound API shape
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::Network { .. } => "network_error",
            ResolveError::Extraction { .. } => "extraction_error",
            ResolveError::Decode(_) => "decode_error",
            ResolveError::DecodeExhausted { .. } => "decode_exhausted",
            ResolveError::Cancelled(_) => "cancelled",
            ResolveError::InvalidRequest(_) | ResolveError::UrlError(_) => "invalid_request",
            ResolveError::UnknownProvider(_) => "unknown_provider",
            ResolveError::Config(_) | ResolveError::JsonError(_) | ResolveError::IoError(_) => {
                "config_error"
            }
        }
    }
}
