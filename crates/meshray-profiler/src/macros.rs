//! Scope timing and the macros that compile away without `profiling`.

use std::time::{Duration, Instant};

use crate::events::EventCategory;

/// Records the time between its creation and drop.
pub struct ScopeGuard {
    category: EventCategory,
    items: u64,
    start: Instant,
}

impl ScopeGuard {
    #[inline]
    #[must_use]
    pub fn new(category: EventCategory) -> Self {
        Self::counting(category, 0)
    }

    /// Guard for a scope that processes `items` primitives or rays.
    #[inline]
    #[must_use]
    pub fn counting(category: EventCategory, items: u64) -> Self {
        Self {
            category,
            items,
            start: Instant::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopeGuard {
    #[inline]
    fn drop(&mut self) {
        let elapsed_ns = u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        crate::context::record_items(self.category, elapsed_ns, self.items);
    }
}

/// Time the rest of the enclosing scope.
///
/// ```ignore
/// use meshray_profiler::{profile_scope, EventCategory};
///
/// fn refit(bvh: &mut Bvh) {
///     profile_scope!(EventCategory::BvhRefit);
///     // ...
/// }
///
/// fn cast(queries: &[RayQuery]) {
///     profile_scope!(EventCategory::BvhBatchQuery, items = queries.len());
///     // ...
/// }
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_scope {
    ($category:expr) => {
        let _profile_guard = $crate::ScopeGuard::new($category);
    };
    ($category:expr, items = $items:expr) => {
        let _profile_guard = $crate::ScopeGuard::counting($category, $items as u64);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_scope {
    ($category:expr) => {};
    ($category:expr, items = $items:expr) => {};
}

/// Record an already measured [`Duration`](std::time::Duration).
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_duration {
    ($category:expr, $duration:expr) => {
        $crate::record_duration($category, $duration.as_nanos() as u64);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_duration {
    ($category:expr, $duration:expr) => {};
}

/// Publish acceleration structure sizes.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! report_index {
    ($index:expr) => {
        $crate::report_index_stats($index);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! report_index {
    ($index:expr) => {};
}
