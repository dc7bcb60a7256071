//! Bounded-by-count-and-window ring buffer backing a [`super::StreamNode`],
//! per §4.4.

use std::collections::VecDeque;

/// A point that can be admitted to a [`RingBuffer`] — anything carrying a
/// monotonic-ish nanosecond timestamp.
pub trait Timestamped {
    fn timestamp_ns(&self) -> i64;
}

/// Bounded by both a maximum count `N` and a retention window `W`
/// (milliseconds). On every insert: points older than `now - W` are
/// dropped, then the oldest point is evicted if the buffer is now over
/// capacity.
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    window_ms: i64,
}

impl<T: Timestamped + Clone> RingBuffer<T> {
    pub fn new(capacity: usize, window_ms: i64) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            window_ms,
        }
    }

    /// Insert `item`, applying the window-then-count admission rule.
    /// Returns `true` if an item was evicted to make room (used by the
    /// caller to count/report backpressure).
    pub fn insert(&mut self, item: T, now_ns: i64) -> bool {
        let cutoff = now_ns - self.window_ms * 1_000_000;
        while self
            .items
            .front()
            .map(|f| f.timestamp_ns() < cutoff)
            .unwrap_or(false)
        {
            self.items.pop_front();
        }

        self.items.push_back(item);

        if self.items.len() > self.capacity {
            self.items.pop_front();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The `k` most recent items, newest last.
    pub fn latest(&self, k: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(k);
        self.items.iter().skip(skip).cloned().collect()
    }

    /// All items with `timestamp_ns >= now_ns - window_ms`.
    pub fn in_window(&self, window_ms: i64, now_ns: i64) -> Vec<T> {
        let cutoff = now_ns - window_ms * 1_000_000;
        self.items
            .iter()
            .filter(|i| i.timestamp_ns() >= cutoff)
            .cloned()
            .collect()
    }

    /// The item whose timestamp is nearest `ts_ns`, if within
    /// `tolerance_ms`. Linear scan — callers hold a snapshot, not a live
    /// view, so this is safe to call from outside the insertion path.
    pub fn closest(&self, ts_ns: i64, tolerance_ms: i64) -> Option<T> {
        let tolerance_ns = tolerance_ms * 1_000_000;
        self.items
            .iter()
            .map(|i| (i, (i.timestamp_ns() - ts_ns).abs()))
            .filter(|(_, dist)| *dist <= tolerance_ns)
            .min_by_key(|(_, dist)| *dist)
            .map(|(i, _)| i.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64);

    impl Timestamped for Item {
        fn timestamp_ns(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn evicts_oldest_over_capacity() {
        let mut buf = RingBuffer::new(3, 60_000);
        for i in 0..5 {
            buf.insert(Item(i * 1_000_000_000), i * 1_000_000_000 + 1);
        }
        assert_eq!(buf.len(), 3);
        let latest = buf.latest(10);
        assert_eq!(latest, vec![Item(2_000_000_000), Item(3_000_000_000), Item(4_000_000_000)]);
    }

    #[test]
    fn insert_reports_eviction() {
        let mut buf = RingBuffer::new(2, 60_000);
        assert!(!buf.insert(Item(0), 0));
        assert!(!buf.insert(Item(1), 1));
        assert!(buf.insert(Item(2), 2));
    }

    #[test]
    fn drops_points_older_than_window_on_insert() {
        let mut buf = RingBuffer::new(100, 1_000); // 1 second window
        buf.insert(Item(0), 0);
        // advance far beyond the window before the next insert
        buf.insert(Item(5_000_000_000), 5_000_000_000);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest(10), vec![Item(5_000_000_000)]);
    }

    #[test]
    fn closest_respects_tolerance() {
        let mut buf = RingBuffer::new(10, 60_000);
        buf.insert(Item(0), 0);
        buf.insert(Item(100_000_000), 100_000_000);
        buf.insert(Item(200_000_000), 200_000_000);

        let found = buf.closest(110_000_000, 20);
        assert_eq!(found, Some(Item(100_000_000)));

        let none = buf.closest(500_000_000, 20);
        assert_eq!(none, None);
    }

    #[test]
    fn in_window_filters_by_age() {
        let mut buf = RingBuffer::new(10, 60_000);
        for i in 0..5 {
            buf.insert(Item(i * 1_000_000_000), 4_000_000_000);
        }
        let recent = buf.in_window(2_000, 4_000_000_000);
        assert_eq!(recent, vec![Item(2_000_000_000), Item(3_000_000_000), Item(4_000_000_000)]);
    }
}
