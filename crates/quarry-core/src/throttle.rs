//! Per-source request throttling.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Politeness budget applied before every target fetch within a scraper.
///
/// `quota_limit` requests are allowed per `quota_window`; callers await
/// [`Throttle::acquire`] and proceed once budget is available.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DirectRateLimiter>,
}

impl Throttle {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// One request per second, the default for scraping public endpoints.
    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1), 1)
    }

    /// Wait until one unit of request budget is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let limit = NonZeroU32::new(limit.max(1)).expect("limit is clamped above zero");
    let per_cell = window
        .checked_div(limit.get())
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_millis(1));
    Quota::with_period(per_cell)
        .expect("per-cell period is non-zero")
        .allow_burst(limit)
}
