//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Requests per second a single peer may submit (damage reports dominate)
pub const REQUEST_RATE_LIMIT: u32 = 30;

/// Per-peer rate limiter state
#[derive(Clone)]
pub struct PeerRateLimiter {
    request_limiter: Arc<Limiter>,
}

impl PeerRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(REQUEST_RATE_LIMIT)
    }

    pub fn with_rate(requests_per_second: u32) -> Self {
        Self {
            request_limiter: create_limiter(requests_per_second),
        }
    }

    /// Check if a request is allowed (returns true if allowed)
    pub fn check_request(&self) -> bool {
        self.request_limiter.check().is_ok()
    }
}

impl Default for PeerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
