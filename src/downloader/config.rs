//! Download configuration constants

use std::time::Duration;

/// Retries per day after the first attempt
pub const MAX_RETRIES: u32 = 3;

/// Backoff unit in milliseconds; retry `i` waits `unit * 2^(i-1)`.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Days downloaded at the same time.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Wall-clock cap for the whole download phase (seconds).
pub const DEFAULT_DOWNLOAD_DEADLINE_SECS: u64 = 60 * 60;

/// Failed days listed in the summary before it switches to "... and N more".
pub const MAX_FAILED_DAYS_DISPLAYED: usize = 10;

/// Suffix of an artifact while it is still being written
pub const PARTIAL_SUFFIX: &str = ".part";

/// Backoff before retry `retry` (1-based) for a given unit, capped at [`MAX_BACKOFF_MS`]
pub fn calculate_backoff(base: Duration, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(20);
    let delay = base.saturating_mul(1u32 << exponent);
    delay.min(Duration::from_millis(MAX_BACKOFF_MS))
}
