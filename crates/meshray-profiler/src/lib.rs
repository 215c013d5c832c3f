//! Timing instrumentation for meshray's gather, build, refit and query
//! stages.
//!
//! With the `profiling` feature off, [`profile_scope!`], [`profile_duration!`]
//! and [`report_index!`] expand to nothing, so call sites cost nothing.
//!
//! ```ignore
//! meshray_profiler::init();
//!
//! {
//!     meshray_profiler::profile_scope!(EventCategory::BvhBuild, items = triangles.len());
//!     let bvh = Bvh::build(&triangles, &config);
//! }
//!
//! meshray_profiler::end_frame(frame, frame_ms);
//! for stats in &meshray_profiler::snapshot().categories {
//!     println!("{}: {:.3} ms", stats.category.name(), stats.avg_ms());
//! }
//! ```

mod collector;
mod context;
mod events;
mod macros;

pub use collector::Collector;
pub use context::{
    end_frame, init, is_initialized, record, record_duration, record_items, report_index_stats,
    reset, shutdown, snapshot,
};
pub use events::{CategoryStats, EventCategory, IndexStats, ProfilerSnapshot, TimingEvent};
pub use macros::ScopeGuard;
