//! Flush Throttle
//!
//! Buffers ticker updates and releases them as one batch per window. The
//! window opens when the buffer goes from empty to non-empty; arrivals while
//! a flush is pending only append. At most one deadline exists at a time.
//!
//! The throttle is a plain value owned by the session task. It never sleeps
//! itself: the owner waits on [`FlushThrottle::deadline`] and calls
//! [`FlushThrottle::take`] when it passes.

use std::time::Duration;

use tokio::time::Instant;

/// Buffer plus the single pending flush deadline.
#[derive(Debug)]
pub struct FlushThrottle<T> {
    window: Duration,
    buffer: Vec<T>,
    deadline: Option<Instant>,
}

impl<T> FlushThrottle<T> {
    /// Create an empty throttle with the given window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            buffer: Vec::new(),
            deadline: None,
        }
    }

    /// Append `item`, scheduling a flush at `now + window` if none is pending.
    ///
    /// Returns `true` when this push scheduled the flush.
    pub fn push(&mut self, item: T, now: Instant) -> bool {
        self.buffer.push(item);
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.window);
        true
    }

    /// When the pending flush is due, if one is pending.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the whole buffer and clear the pending deadline.
    pub fn take(&mut self) -> Vec<T> {
        self.deadline = None;
        std::mem::take(&mut self.buffer)
    }

    /// Drop buffered items and any pending deadline.
    pub fn clear(&mut self) {
        self.deadline = None;
        self.buffer.clear();
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn first_push_schedules_flush() {
        let start = Instant::now();
        let mut throttle = FlushThrottle::new(WINDOW);

        assert!(throttle.push(1, start));
        assert_eq!(throttle.deadline(), Some(start + WINDOW));
    }

    #[test]
    fn later_pushes_keep_original_deadline() {
        let start = Instant::now();
        let mut throttle = FlushThrottle::new(WINDOW);
        throttle.push(1, start);

        assert!(!throttle.push(2, start + Duration::from_millis(300)));
        assert!(!throttle.push(3, start + Duration::from_millis(499)));

        assert_eq!(throttle.deadline(), Some(start + WINDOW));
        assert_eq!(throttle.len(), 3);
    }

    #[test]
    fn take_returns_arrival_order_and_rearms() {
        let start = Instant::now();
        let mut throttle = FlushThrottle::new(WINDOW);
        throttle.push("a", start);
        throttle.push("b", start);

        assert_eq!(throttle.take(), vec!["a", "b"]);
        assert!(throttle.is_empty());
        assert_eq!(throttle.deadline(), None);

        let later = start + Duration::from_secs(2);
        assert!(throttle.push("c", later));
        assert_eq!(throttle.deadline(), Some(later + WINDOW));
    }

    #[test]
    fn clear_discards_buffer_and_deadline() {
        let mut throttle = FlushThrottle::new(WINDOW);
        throttle.push(1, Instant::now());

        throttle.clear();

        assert!(throttle.is_empty());
        assert_eq!(throttle.deadline(), None);
    }

    proptest! {
        #[test]
        fn deadline_is_within_window_of_first_arrival(offsets in prop::collection::vec(0u64..2_000, 1..40)) {
            let start = Instant::now();
            let mut throttle = FlushThrottle::new(WINDOW);
            let mut first_pending: Option<Instant> = None;

            let mut elapsed = 0;
            for offset in offsets {
                elapsed += offset;
                let now = start + Duration::from_millis(elapsed);

                if let Some(deadline) = throttle.deadline()
                    && now >= deadline
                {
                    throttle.take();
                    first_pending = None;
                }

                let scheduled = throttle.push(elapsed, now);
                prop_assert_eq!(scheduled, first_pending.is_none());
                first_pending.get_or_insert(now);

                let deadline = throttle.deadline().unwrap();
                prop_assert_eq!(deadline, first_pending.unwrap() + WINDOW);
            }
        }
    }
}
