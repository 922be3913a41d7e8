use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::EngineMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for engine metrics snapshots.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send + Sync> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send + Sync> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the exporter and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = self.metric_name(suffix);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_counter(&self, suffix: &str, value: u64) {
        self.write_metric("counter", suffix, value);
    }

    fn write_gauge(&self, suffix: &str, value: u64) {
        self.write_metric("gauge", suffix, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send + Sync> MetricsExporter<EngineMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &EngineMetricsSnapshot) {
        self.write_counter("get_calls_total", snapshot.get_calls);
        self.write_counter("get_hits_total", snapshot.get_hits);
        self.write_counter("get_misses_total", snapshot.get_misses);
        self.write_counter("passes_total", snapshot.passes);
        self.write_counter("builder_invocations_total", snapshot.builder_invocations);
        self.write_counter("placeholders_issued_total", snapshot.placeholders_issued);
        self.write_counter("commits_total", snapshot.commits);
        self.write_counter("commit_conflicts_total", snapshot.commit_conflicts);
        self.write_counter("failure_replays_total", snapshot.failure_replays);
        self.write_gauge("cache_len", snapshot.cache_len as u64);
        self.write_gauge("failures_len", snapshot.failures_len as u64);
    }
}
