//! Fixed-window request counting keyed by an identity string.
//!
//! Each key (e.g. `login:203.0.113.9`) owns one counter and one window end.
//! A request in an expired window starts a new window; within a window the
//! counter increments until `max_requests`, after which requests are denied
//! until the window ends. Bursts straddling a boundary can reach twice the
//! nominal rate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::types::Timestamp;

/// Limit applied to one class of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: chrono::Duration,
}

impl RateLimitPolicy {
    /// Login attempts: 5 per 15 minutes.
    pub const LOGIN: Self = Self {
        max_requests: 5,
        window: chrono::Duration::minutes(15),
    };

    /// Share link creation: 10 per hour.
    pub const SHARE_CREATE: Self = Self {
        max_requests: 10,
        window: chrono::Duration::hours(1),
    };

    /// General API traffic: 100 per minute.
    pub const API: Self = Self {
        max_requests: 100,
        window: chrono::Duration::minutes(1),
    };

    pub fn new(max_requests: u32, window: chrono::Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Outcome of a [`RateLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Timestamp,
    /// Milliseconds until the window resets; `0` when allowed.
    pub retry_after_ms: i64,
}

impl RateLimitDecision {
    /// `Retry-After` header value in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> i64 {
        (self.retry_after_ms + 999) / 1000
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_reset_at: Timestamp,
}

/// In-process fixed-window limiter.
///
/// The whole table sits behind one mutex, so increment-then-compare is
/// atomic and the sweep can never interleave with a check.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Count one request against `key` and decide whether it may proceed.
    pub fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get_mut(key) {
            Some(entry) if now < entry.window_reset_at => {
                if entry.count < policy.max_requests {
                    entry.count += 1;
                    RateLimitDecision {
                        allowed: true,
                        remaining: policy.max_requests - entry.count,
                        reset_at: entry.window_reset_at,
                        retry_after_ms: 0,
                    }
                } else {
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: entry.window_reset_at,
                        retry_after_ms: (entry.window_reset_at - now).num_milliseconds().max(1),
                    }
                }
            }
            _ => {
                let window_reset_at = now + policy.window;
                entries.insert(
                    key.to_string(),
                    RateLimitEntry {
                        count: 1,
                        window_reset_at,
                    },
                );
                RateLimitDecision {
                    allowed: policy.max_requests >= 1,
                    remaining: policy.max_requests.saturating_sub(1),
                    reset_at: window_reset_at,
                    retry_after_ms: 0,
                }
            }
        }
    }

    /// Drop every entry whose window has ended. Returns how many were removed.
    ///
    /// An entry reset by a concurrent check has a future window end and is
    /// therefore left alone.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.window_reset_at);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // Counters stay consistent even if a holder panicked mid-update.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
