//! Utility functions for vidhop

pub mod cache;
pub mod clock;
pub mod duration;
pub mod rate_limit;
pub mod redact;
pub mod url;

pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::HostRateLimiter;
pub use redact::{redact, Redacted};
