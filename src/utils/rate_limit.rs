//! Per-host request rate limiting

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::HashMapStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

type KeyedLimiter<C> =
    RateLimiter<String, HashMapStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Checks between sweeps of replenished host state
const DEFAULT_PRUNE_INTERVAL: u64 = 256;

/// Keyed GCRA limiter, one budget per upstream host.
///
/// Hosts are compared case-insensitively. The limiter only ever delays a
/// caller; it never rejects. Hosts whose budget has fully replenished are
/// dropped every `prune_interval` checks.
pub struct HostRateLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    clock: C,
    checks: AtomicU64,
    prune_interval: u64,
}

fn quota(per_second: u32, burst: u32) -> Quota {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    Quota::per_second(rate).allow_burst(burst)
}

impl HostRateLimiter<DefaultClock> {
    /// Create a limiter allowing `per_second` requests per host with `burst` slack
    pub fn new(per_second: u32, burst: u32) -> Self {
        Self::with_clock(per_second, burst, DefaultClock::default())
    }
}

impl<C: Clock> HostRateLimiter<C> {
    pub fn with_clock(per_second: u32, burst: u32, clock: C) -> Self {
        Self {
            limiter: RateLimiter::hashmap_with_clock(quota(per_second, burst), &clock),
            clock,
            checks: AtomicU64::new(0),
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    pub fn with_prune_interval(mut self, interval: u64) -> Self {
        self.prune_interval = interval.max(1);
        self
    }

    /// Take one cell for `host` without waiting; on refusal returns the wait time
    pub fn try_acquire(&self, host: &str) -> Result<(), Duration> {
        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checks % self.prune_interval == 0 {
            self.prune();
        }

        let key = host.to_ascii_lowercase();
        self.limiter
            .check_key(&key)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Wait until a cell for `host` is available
    pub async fn acquire(&self, host: &str) {
        loop {
            match self.try_acquire(host) {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Rate limit reached for {}, waiting {:?}", host, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Drop per-host state that has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    /// Number of hosts currently tracked
    pub fn tracked_hosts(&self) -> usize {
        self.limiter.len()
    }
}
