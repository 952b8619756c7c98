//! # vidhop - stream URL resolution through embed hop chains
//!
//! Turns a movie or episode id into a direct playable stream URL by walking
//! the embed provider's chain of player pages, pulling the encoded token out
//! of the final page and decoding it with a registry of candidate codecs.
//!
//! ## Features
//!
//! - Bounded multi-hop fetching with Referer chaining and per-host rate limits
//! - Pattern-based next-hop and token extraction with an alternate fallback set
//! - Pluggable codec registry: built-in byte transform chains plus remote decrypt endpoints
//! - Cancellation and an overall deadline on every resolution
//! - Uniform `{success, sources, error}` API response
//!
//! ## Example
//!
//! ```rust,no_run
//! use vidhop::{ResolutionRequest, Resolver, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new(ResolverConfig::default())?;
//!
//!     let request = ResolutionRequest::tv("tt0944947", 1, 1)?;
//!     let stream = resolver.resolve(&request).await?;
//!     println!("{} ({})", stream.url, stream.stream_type.as_str());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod codec;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::codec::{CodecRegistry, Decoder, ResultValidator};
pub use crate::core::{
    ApiResponse, MediaType, RequestPayload, ResolutionReport, ResolutionRequest, ResolveState,
    ResolvedStream, Resolver, ResolverConfig, StreamType,
};
pub use crate::platform::{HopFetcher, HttpHopResolver, ProviderConfig, ProviderRegistry};
pub use error::{CancelReason, DecodeError, NetworkCause, ResolveError};
pub use tokio_util::sync::CancellationToken;

/// Result type alias for vidhop operations
pub type Result<T> = std::result::Result<T, ResolveError>;
