//! Request admission: same-origin check and per-client rate limiting.
//!
//! Both checks run before any model or store work.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;

use crate::error::GuardError;

pub const DEFAULT_RATE_LIMIT: u32 = 30;
pub const RATE_WINDOW: Duration = Duration::from_secs(60);
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rejects a present `Origin` that is neither `https://{host}` nor
/// `http://{host}`. A missing origin or host is trusted (same-process calls).
pub fn check_origin(origin: Option<&str>, host: Option<&str>) -> Result<(), GuardError> {
    let (Some(origin), Some(host)) = (origin, host) else {
        return Ok(());
    };

    if origin == format!("https://{host}") || origin == format!("http://{host}") {
        Ok(())
    } else {
        warn!(origin, host, "rejected cross-origin request");
        Err(GuardError::BadOrigin)
    }
}

/// Client key for rate limiting: the first `X-Forwarded-For` entry.
pub fn client_key(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Admission control keyed by client. `check` must be an atomic
/// check-and-increment for a given key.
pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> Result<(), GuardError>;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

impl Bucket {
    fn started_at(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }
}

/// Fixed-window limiter held in process memory.
///
/// The counter resets once more than `window` has passed since the first
/// request of the current window. This is a fixed window, not a sliding one:
/// a client can land `limit` requests at the end of one window and `limit`
/// more at the start of the next.
///
/// Entries are sharded, so requests for different keys do not contend and
/// requests for the same key serialise on the entry lock.
pub struct FixedWindowLimiter {
    buckets: DashMap<String, Bucket>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, RATE_WINDOW)
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), GuardError> {
        match self.buckets.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(Bucket::started_at(now));
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let bucket = slot.get_mut();
                let elapsed = now.saturating_duration_since(bucket.window_start);

                if elapsed > self.window {
                    *bucket = Bucket::started_at(now);
                    return Ok(());
                }
                if bucket.count >= self.limit {
                    let retry_after_secs = self.window.saturating_sub(elapsed).as_secs().max(1);
                    return Err(GuardError::RateLimited { retry_after_secs });
                }
                bucket.count += 1;
                Ok(())
            }
        }
    }

    /// Drops buckets whose window has already ended. Returns how many went.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) <= self.window);
        before - self.buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str) -> Result<(), GuardError> {
        self.check_at(key, Instant::now())
    }
}
