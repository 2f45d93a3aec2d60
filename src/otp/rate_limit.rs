//! Sliding-window rate limiting for OTP requests.
//!
//! Each key keeps the timestamps of its allowed requests inside the trailing
//! window. A request is allowed while fewer than `max_requests` timestamps
//! remain after pruning; rejected requests are not recorded.
//!
//! The window map is process-local. Behind a load balancer every instance
//! enforces its own cap, so the effective limit becomes
//! `max_requests * instances`. Implement [`RateLimiter`] over a shared
//! counter store (TTL keyed by email) to keep a single global cap.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

use super::clock::Clock;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_REQUESTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Whole seconds until the oldest request leaves the window, rounded up.
    #[must_use]
    pub fn wait_seconds(&self) -> Option<u64> {
        match self {
            Self::Allowed => None,
            Self::Limited { retry_after } => Some(ceil_div(retry_after.as_millis(), 1_000)),
        }
    }

    /// Whole minutes until the oldest request leaves the window, rounded up.
    #[must_use]
    pub fn wait_minutes(&self) -> Option<u64> {
        match self {
            Self::Allowed => None,
            Self::Limited { retry_after } => Some(ceil_div(retry_after.as_millis(), 60_000)),
        }
    }
}

fn ceil_div(value: u128, divisor: u128) -> u64 {
    u64::try_from(value.div_ceil(divisor)).unwrap_or(u64::MAX)
}

pub trait RateLimiter: Send + Sync {
    /// Decide on a request for `key`, recording it when allowed.
    fn check_and_record(&self, key: &str) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_and_record(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

pub struct SlidingWindowLimiter {
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
    max_requests: usize,
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            window: to_chrono(DEFAULT_WINDOW),
            max_requests: DEFAULT_MAX_REQUESTS,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = to_chrono(window);
        self
    }

    #[must_use]
    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests.max(1);
        self
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window.to_std().unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Number of keys currently holding a window.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Drop keys whose recorded requests have all aged out. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, stamps| {
            prune(stamps, now, self.window);
            !stamps.is_empty()
        });
        before - windows.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DateTime<Utc>>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check_and_record(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        // Prune, decide and record under one lock so concurrent requests cannot overshoot.
        let mut windows = self.lock();
        let stamps = windows.entry(key.to_string()).or_default();
        prune(stamps, now, self.window);

        if stamps.len() >= self.max_requests {
            let oldest = stamps.front().copied().unwrap_or(now);
            let remaining = self.window - (now - oldest);
            return RateLimitDecision::Limited {
                retry_after: remaining.to_std().unwrap_or(Duration::ZERO),
            };
        }

        stamps.push_back(now);
        RateLimitDecision::Allowed
    }
}

/// Retain only timestamps younger than the window (`age < window`).
fn prune(stamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: chrono::Duration) {
    while let Some(front) = stamps.front() {
        if now - *front >= window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000))
}

/// Spawn a task that periodically drops idle windows.
pub fn spawn_sweeper(
    limiter: Arc<SlidingWindowLimiter>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!(removed, "swept idle rate limit windows");
            }
        }
    })
}
