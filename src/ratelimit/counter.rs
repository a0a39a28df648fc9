use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Event counter over a window split into `bins` sub-windows.
///
/// With a 1000 ms interval and 4 bins, each bin counts events within a 250 ms
/// slot. Retained bins need not be consecutive in time: a burst followed by a
/// pause shorter than the window still counts against the client. Memory is
/// `bins` integers per counter.
#[derive(Debug, Clone)]
pub struct RollingCounter {
    bin_width_ms: u64,
    bins: usize,
    current_index: Option<u64>,
    counts: VecDeque<u64>,
    total: u64,
}

impl RollingCounter {
    /// `interval_ms` is split into `bins` bins of at least 1 ms each.
    #[must_use]
    pub fn new(interval_ms: u64, bins: usize) -> Self {
        let bins = bins.max(1);
        Self {
            bin_width_ms: (interval_ms / bins as u64).max(1),
            bins,
            current_index: None,
            counts: VecDeque::with_capacity(bins),
            total: 0,
        }
    }

    /// Record one event now and return the windowed total.
    pub fn increment(&mut self) -> u64 {
        self.increment_at(now_ms())
    }

    /// Record one event at `now_ms` and return the windowed total.
    ///
    /// Same bin: the current count grows. A later bin within `bins` of the
    /// current one: a new bin is opened and the oldest dropped past `bins`.
    /// First use, idle for longer than the whole window, or a clock that went
    /// backwards: history is discarded.
    pub fn increment_at(&mut self, now_ms: u64) -> u64 {
        let index = now_ms / self.bin_width_ms;

        match self.current_index {
            Some(current) if current == index => {}
            Some(current) if index > current && index - current <= self.bins as u64 => {
                self.counts.push_back(0);
                while self.counts.len() > self.bins {
                    self.counts.pop_front();
                }
                self.current_index = Some(index);
            }
            _ => {
                self.counts.clear();
                self.counts.push_back(0);
                self.current_index = Some(index);
            }
        }

        if let Some(last) = self.counts.back_mut() {
            *last += 1;
        }
        self.total = self.counts.iter().sum();
        self.total
    }

    /// Total over retained bins as of the last increment.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.total
    }

    /// Per-bin counts, oldest first.
    #[must_use]
    pub fn bin_counts(&self) -> Vec<u64> {
        self.counts.iter().copied().collect()
    }

    #[must_use]
    pub fn bin_width_ms(&self) -> u64 {
        self.bin_width_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bin_accumulates() {
        let mut c = RollingCounter::new(1000, 4);
        assert_eq!(c.increment_at(10_000), 1);
        assert_eq!(c.increment_at(10_100), 2);
        assert_eq!(c.increment_at(10_249), 3);
        assert_eq!(c.bin_counts(), vec![3]);
    }

    #[test]
    fn test_new_bins_slide() {
        let mut c = RollingCounter::new(1000, 4);
        c.increment_at(10_000); // bin 40
        c.increment_at(10_250); // bin 41
        c.increment_at(10_500); // bin 42
        c.increment_at(10_750); // bin 43
        assert_eq!(c.bin_counts(), vec![1, 1, 1, 1]);
        assert_eq!(c.increment_at(11_000), 4); // bin 44 pushes bin 40 out
        assert_eq!(c.bin_counts(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_gap_within_window_keeps_history() {
        let mut c = RollingCounter::new(1000, 4);
        c.increment_at(10_000);
        c.increment_at(10_001);
        // three bins later, still within the window
        assert_eq!(c.increment_at(10_750), 3);
        assert_eq!(c.bin_counts(), vec![2, 1]);
    }

    #[test]
    fn test_idle_longer_than_window_resets() {
        let mut c = RollingCounter::new(1000, 4);
        for _ in 0..5 {
            c.increment_at(10_000);
        }
        assert_eq!(c.value(), 5);
        assert_eq!(c.increment_at(12_000), 1);
        assert_eq!(c.bin_counts(), vec![1]);
    }

    #[test]
    fn test_clock_backwards_resets() {
        let mut c = RollingCounter::new(1000, 4);
        c.increment_at(10_000);
        c.increment_at(10_000);
        assert_eq!(c.increment_at(9_000), 1);
    }

    #[test]
    fn test_tiny_interval_has_nonzero_bins() {
        let c = RollingCounter::new(2, 4);
        assert_eq!(c.bin_width_ms(), 1);
    }
}
