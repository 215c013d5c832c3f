//! Process-wide collector used by the profiling macros.

use parking_lot::Mutex;

use crate::collector::Collector;
use crate::events::{EventCategory, IndexStats, ProfilerSnapshot, TimingEvent};

static PROFILER: Mutex<Option<Collector>> = Mutex::new(None);

/// Run `f` on the collector if the profiler is running.
fn with_collector<R>(f: impl FnOnce(&mut Collector) -> R) -> Option<R> {
    PROFILER.lock().as_mut().map(f)
}

/// Start collecting. Events recorded before this are discarded.
pub fn init() {
    let mut guard = PROFILER.lock();
    if guard.is_none() {
        *guard = Some(Collector::new());
        tracing::info!("Profiler initialized");
    }
}

/// Stop collecting and discard all statistics.
pub fn shutdown() {
    if let Some(collector) = PROFILER.lock().take() {
        tracing::info!(dropped = collector.dropped(), "Profiler shut down");
    }
}

#[inline]
pub fn record(event: TimingEvent) {
    with_collector(|c| c.record(event));
}

#[inline]
pub fn record_duration(category: EventCategory, duration_ns: u64) {
    record(TimingEvent::new(category, duration_ns));
}

/// Record a duration together with the number of work items it covered.
#[inline]
pub fn record_items(category: EventCategory, duration_ns: u64, items: u64) {
    record(TimingEvent::with_items(category, duration_ns, items));
}

/// Publish the current acceleration structure sizes.
pub fn report_index_stats(index: IndexStats) {
    with_collector(|c| c.set_index_stats(index));
}

/// Close a frame: pending events are folded into the statistics.
pub fn end_frame(frame_number: u64, frame_time_ms: f32) {
    with_collector(|c| {
        c.set_frame_info(frame_number, frame_time_ms);
        c.flush();
    });
}

/// Statistics as of the last [`end_frame`]. Empty when not initialized.
#[must_use]
pub fn snapshot() -> ProfilerSnapshot {
    with_collector(|c| c.snapshot()).unwrap_or_default()
}

pub fn reset() {
    with_collector(Collector::reset);
}

#[must_use]
pub fn is_initialized() -> bool {
    PROFILER.lock().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test, because the collector is shared by the whole process.
    #[test]
    fn lifecycle() {
        record_duration(EventCategory::BvhBuild, 1_000);
        assert!(snapshot().categories.is_empty());

        init();
        assert!(is_initialized());

        record_duration(EventCategory::BvhBuild, 1_000);
        record_items(EventCategory::BvhRefit, 2_000, 10);
        report_index_stats(IndexStats {
            primitive_count: 10,
            node_count: 19,
            mesh_count: 1,
        });
        end_frame(7, 16.0);

        let snap = snapshot();
        assert_eq!(snap.frame_number, 7);
        assert_eq!(snap.categories.len(), 2);
        assert_eq!(snap.index.node_count, 19);
        assert_eq!(snap.category(EventCategory::BvhRefit).unwrap().total_items, 10);

        reset();
        assert!(snapshot().categories.is_empty());

        shutdown();
        assert!(!is_initialized());
    }
}
