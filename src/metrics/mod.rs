//! Engine metrics (feature `metrics`).
//!
//! Each [`Cache`](crate::cache::Cache) owns a set of atomic
//! [`EngineCounters`]. Callers read them through
//! [`MetricsSnapshotProvider`] and publish them with a [`MetricsExporter`]
//! such as [`PrometheusTextExporter`].

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use metrics_impl::EngineCounters;
pub use snapshot::EngineMetricsSnapshot;
pub use traits::{MetricsExporter, MetricsReset, MetricsSnapshotProvider};
