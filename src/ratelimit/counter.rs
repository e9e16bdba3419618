//! Fixed-window counter implementation.

use std::time::Duration;

use super::quota::Quota;

/// Outcome of a single admission check against a [`WindowCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Admitted inside the current window.
    Admitted,
    /// The previous window had expired; a new one was opened and this
    /// request is its first admission.
    NewWindow,
    /// The current window is full.
    Rejected,
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Rejected)
    }
}

/// Per-key counting state: requests admitted since `window_start`.
///
/// The counter holds no lock of its own. Callers serialise access to it,
/// and the quota is supplied on every call so that override changes apply
/// without touching the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    count: u64,
    window_start: u64,
}

impl WindowCounter {
    /// A counter with nothing admitted and a window opening at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            count: 0,
            window_start: now_ms,
        }
    }

    /// Record one request at `now_ms` under `quota`.
    ///
    /// A window that has run for at least `quota.window()` is replaced by
    /// one anchored at `now_ms`. A rejected request leaves the state as is.
    pub fn admit(&mut self, quota: &Quota, now_ms: u64) -> Decision {
        let elapsed = now_ms.saturating_sub(self.window_start);

        if elapsed >= quota.window_millis() {
            self.window_start = now_ms;
            self.count = 1;
            return Decision::NewWindow;
        }

        if self.count >= quota.limit() {
            return Decision::Rejected;
        }

        self.count += 1;
        Decision::Admitted
    }

    /// Requests counted in the current window.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// When the current window opened, in epoch milliseconds.
    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    /// Remaining admissions under `quota`, without checking for expiry.
    pub fn remaining(&self, quota: &Quota) -> u64 {
        quota.limit().saturating_sub(self.count)
    }

    /// Epoch milliseconds at which the current window ends under `quota`.
    pub fn reset_at(&self, quota: &Quota) -> u64 {
        self.window_start.saturating_add(quota.window_millis())
    }

    /// Time left in the current window as seen at `now_ms`.
    pub fn duration_until_reset(&self, quota: &Quota, now_ms: u64) -> Duration {
        Duration::from_millis(self.reset_at(quota).saturating_sub(now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(limit: u64, window_ms: u64) -> Quota {
        Quota::from_millis(limit, window_ms).unwrap()
    }

    #[test]
    fn test_counter_admits_within_limit() {
        let q = quota(10, 1_000);
        let mut counter = WindowCounter::new(0);

        assert_eq!(counter.admit(&q, 0), Decision::Admitted);
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.remaining(&q), 9);
    }

    #[test]
    fn test_counter_rejects_over_limit() {
        let q = quota(5, 1_000);
        let mut counter = WindowCounter::new(0);

        for _ in 0..5 {
            assert!(counter.admit(&q, 10).is_allowed());
        }

        // The 6th request is rejected and does not move the count
        assert_eq!(counter.admit(&q, 10), Decision::Rejected);
        assert_eq!(counter.count(), 5);
        assert_eq!(counter.remaining(&q), 0);
    }

    #[test]
    fn test_counter_opens_new_window_at_boundary() {
        let q = quota(2, 1_000);
        let mut counter = WindowCounter::new(100);

        counter.admit(&q, 100);
        counter.admit(&q, 100);
        assert_eq!(counter.admit(&q, 1_099), Decision::Rejected);

        // Exactly one window length after the anchor
        assert_eq!(counter.admit(&q, 1_100), Decision::NewWindow);
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.window_start(), 1_100);
    }

    #[test]
    fn test_new_window_is_anchored_to_first_request() {
        let q = quota(1, 1_000);
        let mut counter = WindowCounter::new(0);

        counter.admit(&q, 0);
        assert_eq!(counter.admit(&q, 2_500), Decision::NewWindow);

        // Not aligned to multiples of the window
        assert_eq!(counter.reset_at(&q), 3_500);
        assert_eq!(counter.admit(&q, 3_000), Decision::Rejected);
    }

    #[test]
    fn test_duration_until_reset() {
        let q = quota(3, 1_000);
        let mut counter = WindowCounter::new(1_000);
        counter.admit(&q, 1_000);

        assert_eq!(counter.duration_until_reset(&q, 1_400), Duration::from_millis(600));
        assert_eq!(counter.duration_until_reset(&q, 5_000), Duration::ZERO);
    }

    #[test]
    fn test_clock_going_backwards_stays_in_window() {
        let q = quota(1, 1_000);
        let mut counter = WindowCounter::new(5_000);

        counter.admit(&q, 5_000);
        assert_eq!(counter.admit(&q, 4_000), Decision::Rejected);
    }
}
