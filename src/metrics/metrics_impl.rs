use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::EngineMetricsSnapshot;

/// Atomic engine counters shared by a cache and the contexts attached to it.
#[derive(Debug, Default)]
pub struct EngineCounters {
    get_calls: AtomicU64,
    get_hits: AtomicU64,
    get_misses: AtomicU64,
    passes: AtomicU64,
    builder_invocations: AtomicU64,
    placeholders_issued: AtomicU64,
    commits: AtomicU64,
    commit_conflicts: AtomicU64,
    failure_replays: AtomicU64,
}

impl EngineCounters {
    /// Snapshot the counters. Gauges are left at zero for the caller to fill.
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            get_calls: self.get_calls.load(Ordering::Relaxed),
            get_hits: self.get_hits.load(Ordering::Relaxed),
            get_misses: self.get_misses.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            builder_invocations: self.builder_invocations.load(Ordering::Relaxed),
            placeholders_issued: self.placeholders_issued.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            commit_conflicts: self.commit_conflicts.load(Ordering::Relaxed),
            failure_replays: self.failure_replays.load(Ordering::Relaxed),
            cache_len: 0,
            failures_len: 0,
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.get_calls,
            &self.get_hits,
            &self.get_misses,
            &self.passes,
            &self.builder_invocations,
            &self.placeholders_issued,
            &self.commits,
            &self.commit_conflicts,
            &self.failure_replays,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn inc_get_call(&self) {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_get_hit(&self) {
        self.get_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_get_miss(&self) {
        self.get_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_builder_invocation(&self) {
        self.builder_invocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_placeholder_issued(&self) {
        self.placeholders_issued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_commit_conflict(&self) {
        self.commit_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_failure_replay(&self) {
        self.failure_replays.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CacheBuilder;
    use crate::context::GenerationContext;
    use crate::error::EngineError;
    use crate::metrics::traits::{MetricsReset, MetricsSnapshotProvider};
    use crate::placeholder::{PlaceholderHandle, PlaceholderValue};

    #[derive(Debug, Clone, PartialEq)]
    enum Chain {
        Link(Box<Chain>),
        Back(PlaceholderHandle<Chain>),
    }

    #[test]
    fn counters_snapshot_and_reset() {
        let counters = EngineCounters::default();
        counters.inc_get_call();
        counters.inc_get_hit();
        counters.inc_commit();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.get_calls, 1);
        assert_eq!(snapshot.get_hits, 1);
        assert_eq!(snapshot.commits, 1);
        assert_eq!(snapshot.hit_ratio(), 1.0);

        counters.reset();
        assert_eq!(counters.snapshot(), EngineMetricsSnapshot::default());
    }

    #[test]
    fn cache_records_passes_builds_and_placeholders() {
        let cache = CacheBuilder::new()
            .builder(|ctx: &mut GenerationContext<u8, Chain>, key: &u8| {
                let next = ctx.try_get_or_build(key)?;
                Ok(Chain::Link(Box::new(next.ok_or_else(|| {
                    EngineError::derivation(std::fmt::Error)
                })?)))
            })
            .placeholder_factory(|_: &u8| PlaceholderValue::forwarding(Chain::Back))
            .build();

        cache.get_or_add(&1).unwrap();
        cache.get_or_add(&1).unwrap();

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.get_calls, 2);
        assert_eq!(snapshot.get_hits, 1);
        assert_eq!(snapshot.get_misses, 1);
        assert_eq!(snapshot.passes, 1);
        assert_eq!(snapshot.builder_invocations, 1);
        assert_eq!(snapshot.placeholders_issued, 1);
        assert_eq!(snapshot.commits, 1);
        assert_eq!(snapshot.cache_len, 1);

        cache.reset_metrics();
        assert_eq!(cache.snapshot().get_calls, 0);
        assert_eq!(cache.snapshot().cache_len, 1);
    }
}
