//! Time source for order placement and metric timestamps.

use chrono::{DateTime, Utc};

/// Supplies `created_at`, `processed_at` and `computed_at` values.
///
/// Injected as `Arc<dyn Clock>` so tests can pin timestamps.
pub trait Clock: Send + Sync {
    /// The current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used by the binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotone_enough_for_ordering() {
        let first = SystemClock.now();
        let second = SystemClock.now();

        assert!(second >= first);
    }
}
