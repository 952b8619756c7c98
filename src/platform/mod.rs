//! HTTP hops, page extraction and provider definitions

pub mod client;
pub mod extractor;
pub mod hop;
pub mod provider;
pub mod retry;

pub use client::*;
pub use extractor::*;
pub use hop::*;
pub use provider::*;
pub use retry::*;
