//! Timing events and the statistics folded from them.

use serde::{Deserialize, Serialize};

const NS_PER_MS: f64 = 1_000_000.0;
const NS_PER_SEC: f64 = 1_000_000_000.0;

/// Stage of the acceleration structure pipeline an event belongs to.
///
/// Variants are declared in pipeline order, which is also display order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EventCategory {
    /// Flattening meshes into the primitive array.
    #[default]
    PrimitiveGather,
    /// Full hierarchy construction.
    BvhBuild,
    /// Bottom-up box refit.
    BvhRefit,
    /// Single closest-hit query.
    BvhQuery,
    /// Parallel batch of queries.
    BvhBatchQuery,
}

impl EventCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 5] = [
        Self::PrimitiveGather,
        Self::BvhBuild,
        Self::BvhRefit,
        Self::BvhQuery,
        Self::BvhBatchQuery,
    ];

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PrimitiveGather => "Gather",
            Self::BvhBuild => "Build",
            Self::BvhRefit => "Refit",
            Self::BvhQuery => "Query",
            Self::BvhBatchQuery => "Batch Query",
        }
    }
}

/// One measured scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEvent {
    pub category: EventCategory,
    pub duration_ns: u64,
    /// Work items the scope covered (primitives, rays). Zero when unknown.
    pub items: u64,
}

impl TimingEvent {
    #[must_use]
    pub const fn new(category: EventCategory, duration_ns: u64) -> Self {
        Self::with_items(category, duration_ns, 0)
    }

    #[must_use]
    pub const fn with_items(category: EventCategory, duration_ns: u64, items: u64) -> Self {
        Self {
            category,
            duration_ns,
            items,
        }
    }
}

/// Running totals for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: EventCategory,
    pub count: u32,
    pub total_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    /// 95th percentile over the recent sample window. Zero until the window
    /// holds enough samples.
    pub p95_ns: u64,
    /// Work items summed over all events.
    pub total_items: u64,
}

impl CategoryStats {
    #[must_use]
    pub const fn new(category: EventCategory) -> Self {
        Self {
            category,
            count: 0,
            total_ns: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            p95_ns: 0,
            total_items: 0,
        }
    }

    /// Fold one event into the totals.
    pub fn add(&mut self, event: &TimingEvent) {
        self.count += 1;
        self.total_ns += event.duration_ns;
        self.min_ns = self.min_ns.min(event.duration_ns);
        self.max_ns = self.max_ns.max(event.duration_ns);
        self.total_items += event.items;
    }

    #[must_use]
    pub fn avg_ns(&self) -> u64 {
        self.total_ns.checked_div(u64::from(self.count)).unwrap_or(0)
    }

    #[must_use]
    pub fn avg_ms(&self) -> f64 {
        self.avg_ns() as f64 / NS_PER_MS
    }

    #[must_use]
    pub fn max_ms(&self) -> f64 {
        self.max_ns as f64 / NS_PER_MS
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns as f64 / NS_PER_MS
    }

    /// Work items processed per second of measured time.
    #[must_use]
    pub fn items_per_sec(&self) -> f64 {
        if self.total_ns == 0 {
            return 0.0;
        }
        self.total_items as f64 * NS_PER_SEC / self.total_ns as f64
    }
}

/// Size of the acceleration structures currently alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Triangles across all structures.
    pub primitive_count: u64,
    /// Nodes across all structures.
    pub node_count: u64,
    /// Meshes referenced by all structures.
    pub mesh_count: u64,
}

/// Point-in-time copy of everything the profiler knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilerSnapshot {
    pub frame_number: u64,
    pub frame_time_ms: f32,
    /// Categories with at least one event, in display order.
    pub categories: Vec<CategoryStats>,
    /// Last reported structure sizes.
    pub index: IndexStats,
}

impl ProfilerSnapshot {
    #[must_use]
    pub fn category(&self, category: EventCategory) -> Option<&CategoryStats> {
        self.categories.iter().find(|s| s.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_fold_events() {
        let mut stats = CategoryStats::new(EventCategory::BvhBuild);
        stats.add(&TimingEvent::with_items(EventCategory::BvhBuild, 2_000_000, 100));
        stats.add(&TimingEvent::with_items(EventCategory::BvhBuild, 4_000_000, 200));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min_ns, 2_000_000);
        assert_eq!(stats.max_ns, 4_000_000);
        assert_eq!(stats.total_items, 300);
        assert!((stats.avg_ms() - 3.0).abs() < f64::EPSILON);
        assert!((stats.total_ms() - 6.0).abs() < f64::EPSILON);
        assert!((stats.items_per_sec() - 50_000.0).abs() < 1e-6);
    }

    #[test]
    fn empty_stats_have_no_average() {
        let stats = CategoryStats::new(EventCategory::BvhQuery);
        assert_eq!(stats.avg_ns(), 0);
        assert!(stats.items_per_sec().abs() < f64::EPSILON);
    }

    #[test]
    fn categories_sort_in_pipeline_order() {
        let mut sorted = EventCategory::ALL;
        sorted.reverse();
        sorted.sort();
        assert_eq!(sorted, EventCategory::ALL);
    }
}
