//! Fail-safe expiry bookkeeping.
//!
//! The device reverts uncommitted commissioning state when its fail-safe
//! expires. The commissioner tracks the latest expiry it has asked for and
//! only ever moves it later.

use std::time::{Duration, Instant};

/// Commissioner-side view of one device's fail-safe deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailSafeTimer {
    expiry: Option<Instant>,
}

impl FailSafeTimer {
    /// Timer with no recorded expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest recorded expiry.
    pub fn expiry(&self) -> Option<Instant> {
        self.expiry
    }

    /// Candidate expiry for an extension of `duration` from `now`.
    ///
    /// Returns `None` when the candidate is not strictly later than the
    /// recorded expiry; the caller must then send nothing.
    pub fn plan_extension(&self, now: Instant, duration: Duration) -> Option<Instant> {
        let candidate = now.checked_add(duration)?;
        match self.expiry {
            Some(current) if candidate <= current => None,
            _ => Some(candidate),
        }
    }

    /// Record an expiry the device has been asked for.
    pub fn record(&mut self, expiry: Instant) {
        self.expiry = Some(self.expiry.map_or(expiry, |current| current.max(expiry)));
    }

    /// Forget the recorded expiry after a disarm or a completed attempt.
    pub fn clear(&mut self) {
        self.expiry = None;
    }
}

/// Fail-safe seconds to request before enabling a network.
///
/// Adds the worst-case round trip of an initial CASE message so the device
/// stays armed until the commissioner can reach it operationally. Saturates
/// at the largest encodable value.
pub fn network_enable_extension(requested_seconds: u16, sigma1_rtt: Duration) -> u16 {
    let rtt = u16::try_from(sigma1_rtt.as_secs()).unwrap_or(u16::MAX);
    requested_seconds.saturating_add(rtt)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn shorter_extension_is_a_no_op() {
        let start = Instant::now();
        let mut timer = FailSafeTimer::new();
        let first = timer.plan_extension(start, Duration::from_secs(60)).unwrap();
        timer.record(first);

        assert!(timer.plan_extension(start, Duration::from_secs(30)).is_none());
        assert!(timer.plan_extension(start, Duration::from_secs(60)).is_none());
        assert!(timer.plan_extension(start, Duration::from_secs(61)).is_some());
    }

    #[test]
    fn network_enable_extension_saturates() {
        assert_eq!(network_enable_extension(60, Duration::from_secs(10)), 70);
        assert_eq!(network_enable_extension(u16::MAX - 5, Duration::from_secs(10)), u16::MAX);
        assert_eq!(network_enable_extension(1, Duration::from_secs(1 << 20)), u16::MAX);
    }

    proptest! {
        #[test]
        fn recorded_expiry_never_decreases(
            steps in prop::collection::vec((0u64..600, 0u64..600), 1..32)
        ) {
            let base = Instant::now();
            let mut timer = FailSafeTimer::new();
            let mut last: Option<Instant> = None;

            for (elapsed, seconds) in steps {
                let now = base + Duration::from_secs(elapsed);
                if let Some(expiry) = timer.plan_extension(now, Duration::from_secs(seconds)) {
                    if let Some(prev) = last {
                        prop_assert!(expiry > prev);
                    }
                    timer.record(expiry);
                }
                // Out-of-order recording must not move the deadline back
                timer.record(now);
                if let (Some(prev), Some(current)) = (last, timer.expiry()) {
                    prop_assert!(current >= prev);
                }
                last = timer.expiry();
            }
        }
    }
}
