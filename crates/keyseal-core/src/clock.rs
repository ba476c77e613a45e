//! Wall-clock helpers.
//!
//! Protocol logic takes explicit `now_ms` parameters so tests can drive
//! time; only the orchestration layer reads the system clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
///
/// Saturates to zero if the system clock is before the epoch.
#[must_use]
pub fn unix_millis_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01 in unix millis
        assert!(unix_millis_now() > 1_577_836_800_000);
    }
}
