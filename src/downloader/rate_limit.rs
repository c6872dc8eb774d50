//! Quota tracking driven by the provider's rate-limit headers
//!
//! The provider advertises its remaining call budget on every response. The
//! [`RateLimiter`] keeps the last advertised values and, when the budget is
//! nearly exhausted, holds the next request until the quota window resets.

use crate::clock::SharedClock;
use crate::downloader::config::{
    DEFAULT_CALL_BUDGET, DEFAULT_RESET_WINDOW_SECS, RATE_LIMIT_LOW_WATER_MARK,
    RATE_LIMIT_PLENTY_THRESHOLD, RATE_LIMIT_RESET_GRACE,
};
use crate::shutdown::{Cancelled, ShutdownCoordinator};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::HeaderMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the size of the quota window
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Header carrying the calls left in the current window
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
/// Header carrying the window reset time as unix seconds
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Rate-limit values advertised by a single response
///
/// Every field is optional: a missing or unparseable header yields `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    /// Calls allowed per window
    pub limit: Option<u32>,
    /// Calls left in the current window
    pub remaining: Option<u32>,
    /// When the current window resets
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitSnapshot {
    /// Extract the rate-limit headers from a response
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: parse_header(headers, LIMIT_HEADER),
            remaining: parse_header(headers, REMAINING_HEADER),
            reset_at: parse_header::<i64>(headers, RESET_HEADER)
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }

    /// Whether no rate-limit header was present
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset_at.is_none()
    }
}

fn parse_header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = headers.get(name)?.to_str().ok()?.trim();
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(header = name, value = raw, error = %e, "Ignoring unparseable rate limit header");
            None
        }
    }
}

/// Last known quota state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    /// Calls left in the current window
    pub remaining: u32,
    /// Calls allowed per window
    pub limit: u32,
    /// When the current window resets
    pub reset_at: DateTime<Utc>,
}

/// Header-driven rate limiter
///
/// State is last-write-wins: each response overwrites whatever it advertises
/// and leaves the rest untouched. The mutex only guards individual reads and
/// writes; callers sharing one limiter across concurrent fetchers still race
/// on the budget itself.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Create a limiter that assumes an ample budget until told otherwise
    pub fn new(clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(RateLimitState {
                remaining: DEFAULT_CALL_BUDGET,
                limit: DEFAULT_CALL_BUDGET,
                reset_at: now + ChronoDuration::seconds(DEFAULT_RESET_WINDOW_SECS),
            }),
            clock,
        }
    }

    /// Overwrite every field the response advertised
    pub fn update_from_headers(&self, snapshot: &RateLimitSnapshot) {
        let mut state = self.lock();
        if let Some(limit) = snapshot.limit {
            state.limit = limit;
        }
        if let Some(remaining) = snapshot.remaining {
            state.remaining = remaining;
        }
        if let Some(reset_at) = snapshot.reset_at {
            state.reset_at = reset_at;
        }
        debug!(
            remaining = state.remaining,
            limit = state.limit,
            reset_at = %state.reset_at,
            "Rate limit state updated"
        );
    }

    /// Current quota state
    pub fn status(&self) -> RateLimitState {
        *self.lock()
    }

    /// How long the next request has to wait, if at all
    ///
    /// Nothing waits while more than [`RATE_LIMIT_PLENTY_THRESHOLD`] calls remain.
    /// At or below [`RATE_LIMIT_LOW_WATER_MARK`] the wait runs until one grace
    /// second past the advertised reset. The band in between is not throttled.
    pub fn required_wait(&self) -> Option<Duration> {
        let state = self.status();

        if state.remaining > RATE_LIMIT_PLENTY_THRESHOLD {
            return None;
        }

        if state.remaining <= RATE_LIMIT_LOW_WATER_MARK {
            let until_reset = state.reset_at - self.clock.now();
            if let Ok(until_reset) = until_reset.to_std() {
                if !until_reset.is_zero() {
                    return Some(until_reset + RATE_LIMIT_RESET_GRACE);
                }
            }
        }

        None
    }

    /// Suspend until the quota allows another request
    ///
    /// Returns the time spent waiting, or [`Cancelled`] when shutdown was
    /// requested during the wait.
    pub async fn wait_if_needed(
        &self,
        shutdown: &ShutdownCoordinator,
    ) -> Result<Option<Duration>, Cancelled> {
        let Some(wait) = self.required_wait() else {
            return Ok(None);
        };

        let state = self.status();
        warn!(
            remaining = state.remaining,
            reset_at = %state.reset_at,
            wait_ms = wait.as_millis() as u64,
            "Call budget nearly exhausted, waiting for quota reset"
        );
        crate::metrics::record_rate_limit_wait(wait);

        shutdown.sleep(wait).await?;
        Ok(Some(wait))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
