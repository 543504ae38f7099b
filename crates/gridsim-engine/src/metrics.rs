//! Clock metrics.
//!
//! [`ClockMetrics`] is a plain snapshot; the driver updates a set of
//! atomic counters and [`SimulationClock::metrics`](crate::SimulationClock::metrics)
//! copies them out.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected by the clock driver.
///
/// Durations are in microseconds, measured from tick begin to tick end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockMetrics {
    /// Ticks that began and ended.
    pub ticks_completed: u64,
    /// Slots skipped because the previous tick was still busy.
    pub ticks_skipped: u64,
    /// Program threads released into the most recent tick.
    pub last_released: u64,
    /// Duration of the most recent tick.
    pub last_tick_us: u64,
    /// Longest tick so far.
    pub max_tick_us: u64,
}

#[derive(Default)]
pub(crate) struct MetricsCell {
    ticks_completed: AtomicU64,
    ticks_skipped: AtomicU64,
    last_released: AtomicU64,
    last_tick_us: AtomicU64,
    max_tick_us: AtomicU64,
}

impl MetricsCell {
    pub(crate) fn record_begin(&self, released: usize) {
        self.last_released.store(released as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_end(&self, tick_us: u64) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
        self.last_tick_us.store(tick_us, Ordering::Relaxed);
        self.max_tick_us.fetch_max(tick_us, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) -> u64 {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn snapshot(&self) -> ClockMetrics {
        ClockMetrics {
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            last_released: self.last_released.load(Ordering::Relaxed),
            last_tick_us: self.last_tick_us.load(Ordering::Relaxed),
            max_tick_us: self.max_tick_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = MetricsCell::default().snapshot();
        assert_eq!(m, ClockMetrics::default());
    }

    #[test]
    fn max_tracks_longest_tick() {
        let cell = MetricsCell::default();
        cell.record_begin(3);
        cell.record_end(40);
        cell.record_end(15);
        assert_eq!(cell.record_skip(), 1);
        let m = cell.snapshot();
        assert_eq!(m.ticks_completed, 2);
        assert_eq!(m.ticks_skipped, 1);
        assert_eq!(m.last_released, 3);
        assert_eq!(m.last_tick_us, 15);
        assert_eq!(m.max_tick_us, 40);
    }
}
