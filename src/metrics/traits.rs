//! # Metrics Traits
//!
//! Recording, snapshotting and export are separate responsibilities:
//!
//! ```text
//!   GenerationContext / Cache ──record──▶ EngineCounters (atomics)
//!                                               │
//!                         MetricsSnapshotProvider::snapshot()
//!                                               ▼
//!                                     EngineMetricsSnapshot
//!                                               │
//!                              MetricsExporter::export(&snapshot)
//!                                               ▼
//!                                  Prometheus text / other sinks
//! ```
//!
//! - Production: snapshot periodically and hand the result to an exporter.
//! - Bench/Test: snapshot, assert, and reset between iterations.

/// Produce a point-in-time copy of a component's metrics.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
