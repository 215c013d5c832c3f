//! Buffers events between frames and folds them into per-category totals.

use std::collections::{HashMap, VecDeque};

use crate::events::{CategoryStats, EventCategory, IndexStats, ProfilerSnapshot, TimingEvent};

/// Durations kept per category for the percentile estimate.
const PERCENTILE_WINDOW: usize = 128;

/// Samples needed before a percentile is reported.
const PERCENTILE_MIN_SAMPLES: usize = 10;

/// Events beyond this many between flushes are dropped.
const MAX_PENDING_EVENTS: usize = 4096;

#[derive(Default)]
pub struct Collector {
    pending: Vec<TimingEvent>,
    dropped: u64,
    stats: HashMap<EventCategory, CategoryStats>,
    window: HashMap<EventCategory, VecDeque<u64>>,
    index: IndexStats,
    frame_number: u64,
    frame_time_ms: f32,
}

impl Collector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: TimingEvent) {
        if self.pending.len() < MAX_PENDING_EVENTS {
            self.pending.push(event);
        } else {
            self.dropped += 1;
        }
    }

    pub fn set_index_stats(&mut self, index: IndexStats) {
        self.index = index;
    }

    pub fn set_frame_info(&mut self, frame_number: u64, frame_time_ms: f32) {
        self.frame_number = frame_number;
        self.frame_time_ms = frame_time_ms;
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Events lost because the pending buffer was full.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Fold pending events into the totals and refresh the percentiles of
    /// every category that received events.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let mut touched = Vec::new();
        for event in self.pending.drain(..) {
            self.stats
                .entry(event.category)
                .or_insert_with(|| CategoryStats::new(event.category))
                .add(&event);

            let window = self.window.entry(event.category).or_default();
            if window.len() == PERCENTILE_WINDOW {
                window.pop_front();
            }
            window.push_back(event.duration_ns);

            if !touched.contains(&event.category) {
                touched.push(event.category);
            }
        }

        for category in touched {
            let p95 = self.window.get(&category).and_then(percentile_95);
            if let (Some(stats), Some(p95)) = (self.stats.get_mut(&category), p95) {
                stats.p95_ns = p95;
            }
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.dropped = 0;
        self.stats.clear();
        self.window.clear();
    }

    #[must_use]
    pub fn snapshot(&self) -> ProfilerSnapshot {
        let categories = EventCategory::ALL
            .iter()
            .filter_map(|category| self.stats.get(category).copied())
            .collect();

        ProfilerSnapshot {
            frame_number: self.frame_number,
            frame_time_ms: self.frame_time_ms,
            categories,
            index: self.index,
        }
    }

    #[must_use]
    pub fn stats(&self, category: EventCategory) -> Option<&CategoryStats> {
        self.stats.get(&category)
    }
}

fn percentile_95(window: &VecDeque<u64>) -> Option<u64> {
    if window.len() < PERCENTILE_MIN_SAMPLES {
        return None;
    }
    let mut samples: Vec<u64> = window.iter().copied().collect();
    let rank = (samples.len() * 95 / 100).min(samples.len() - 1);
    Some(*samples.select_nth_unstable(rank).1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(category: EventCategory, duration_ns: u64) -> TimingEvent {
        TimingEvent::new(category, duration_ns)
    }

    #[test]
    fn flush_folds_pending_events() {
        let mut collector = Collector::new();
        collector.record(timing(EventCategory::BvhBuild, 16_000_000));
        collector.record(timing(EventCategory::BvhBuild, 17_000_000));
        collector.record(TimingEvent::with_items(EventCategory::BvhRefit, 5_000_000, 64));
        assert_eq!(collector.pending_len(), 3);

        collector.flush();
        assert_eq!(collector.pending_len(), 0);

        let build = collector.stats(EventCategory::BvhBuild).unwrap();
        assert_eq!(build.count, 2);
        assert_eq!(build.min_ns, 16_000_000);
        assert_eq!(build.max_ns, 17_000_000);

        let refit = collector.stats(EventCategory::BvhRefit).unwrap();
        assert_eq!(refit.count, 1);
        assert_eq!(refit.total_items, 64);
    }

    #[test]
    fn snapshot_lists_categories_in_pipeline_order() {
        let mut collector = Collector::new();
        collector.record(timing(EventCategory::BvhQuery, 1_000));
        collector.record(timing(EventCategory::PrimitiveGather, 4_000_000));
        collector.record(timing(EventCategory::BvhBuild, 10_000_000));
        collector.flush();

        let order: Vec<_> = collector
            .snapshot()
            .categories
            .iter()
            .map(|s| s.category)
            .collect();
        assert_eq!(
            order,
            vec![
                EventCategory::PrimitiveGather,
                EventCategory::BvhBuild,
                EventCategory::BvhQuery
            ]
        );
    }

    #[test]
    fn p95_needs_enough_samples() {
        let mut collector = Collector::new();
        for i in 1..PERCENTILE_MIN_SAMPLES as u64 {
            collector.record(timing(EventCategory::BvhQuery, i));
        }
        collector.flush();
        assert_eq!(collector.stats(EventCategory::BvhQuery).unwrap().p95_ns, 0);

        for i in 1..=20 {
            collector.record(timing(EventCategory::BvhQuery, i * 100));
        }
        collector.flush();
        assert!(collector.stats(EventCategory::BvhQuery).unwrap().p95_ns >= 1_900);
    }

    #[test]
    fn window_keeps_recent_samples() {
        let mut collector = Collector::new();
        for _ in 0..PERCENTILE_WINDOW {
            collector.record(timing(EventCategory::BvhRefit, 1_000_000));
        }
        collector.flush();
        for _ in 0..PERCENTILE_WINDOW {
            collector.record(timing(EventCategory::BvhRefit, 10));
        }
        collector.flush();

        let refit = collector.stats(EventCategory::BvhRefit).unwrap();
        assert_eq!(refit.p95_ns, 10);
        assert_eq!(refit.max_ns, 1_000_000);
    }

    #[test]
    fn overflow_is_counted() {
        let mut collector = Collector::new();
        for _ in 0..MAX_PENDING_EVENTS + 10 {
            collector.record(timing(EventCategory::BvhQuery, 1));
        }
        assert_eq!(collector.pending_len(), MAX_PENDING_EVENTS);
        assert_eq!(collector.dropped(), 10);
    }

    #[test]
    fn reset_clears_stats() {
        let mut collector = Collector::new();
        collector.record(timing(EventCategory::BvhBuild, 16_000_000));
        collector.flush();
        assert!(collector.stats(EventCategory::BvhBuild).is_some());

        collector.reset();
        assert!(collector.stats(EventCategory::BvhBuild).is_none());
        assert!(collector.snapshot().categories.is_empty());
    }
}
