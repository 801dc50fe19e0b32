//! Wall-clock timestamps in epoch milliseconds

use chrono::Utc;

/// Current time as milliseconds since the Unix epoch
///
/// Clocks set before 1970 clamp to zero.
#[inline]
#[must_use]
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 0);
        assert!(b >= a);
    }
}
