//! Download configuration constants

use std::time::Duration;

/// Pause between consecutive page requests.
/// Keeps a full traversal polite toward the provider without a token bucket.
pub const INTER_PAGE_DELAY_MS: u64 = 500;

/// Above this many remaining calls the rate limiter never waits.
pub const RATE_LIMIT_PLENTY_THRESHOLD: u32 = 10;

/// At or below this many remaining calls the rate limiter waits for the quota reset.
/// Between this and [`RATE_LIMIT_PLENTY_THRESHOLD`] requests go out unthrottled.
pub const RATE_LIMIT_LOW_WATER_MARK: u32 = 5;

/// Extra wait added after an advertised reset time to absorb clock skew.
pub const RATE_LIMIT_RESET_GRACE: Duration = Duration::from_secs(1);

/// Assumed call budget before the first response is seen.
pub const DEFAULT_CALL_BUDGET: u32 = 1000;

/// Assumed quota window before the first response is seen.
pub const DEFAULT_RESET_WINDOW_SECS: i64 = 3600;

/// Overall deadline for one CLI invocation.
pub const RUN_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Number of pages needed to cover `total_results` at `page_size` results per page
pub fn page_count(total_results: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_results.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}
