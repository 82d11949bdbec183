//! Retry schedule for unclassified delivery failures.

use std::time::Duration;

/// Maximum delivery attempts before a message is abandoned.
pub const MAX_ATTEMPTS: i64 = 5;

/// Fixed escalating schedule; the last value holds for any attempt beyond
/// the schedule's length.
const RETRY_SCHEDULE: [Duration; 5] = [
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(300),
    Duration::from_secs(900),
];

/// Delay before the retry that follows the given failed attempt (1-based).
pub fn retry_delay(attempt: i64) -> Duration {
    let index = usize::try_from(attempt.max(1) - 1).unwrap_or(0);
    RETRY_SCHEDULE[index.min(RETRY_SCHEDULE.len() - 1)]
}
