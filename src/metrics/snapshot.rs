/// Point-in-time copy of one cache's engine counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,

    pub passes: u64,              // generation passes started by get_or_add
    pub builder_invocations: u64, // every builder call, nested ones included
    pub placeholders_issued: u64,

    pub commits: u64,
    pub commit_conflicts: u64,
    pub failure_replays: u64, // memoized failures handed back without building

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub failures_len: usize,
}

impl EngineMetricsSnapshot {
    /// Fraction of `get_or_add` calls served from published entries.
    pub fn hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }
}
