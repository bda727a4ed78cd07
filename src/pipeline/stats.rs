//! Per-stage timing accumulation for one reader run.
//!
//! Owned by the reader, not static, so two documents processed in
//! parallel never pollute each other's numbers. The interior mutex keeps
//! a single run's accounting correct even if a caller shares the reader
//! across threads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Accumulated wall-clock time and call count for pipeline stages.
#[derive(Debug, Default)]
pub struct StageStats {
    entries: Mutex<HashMap<&'static str, (Duration, u64)>>,
}

impl StageStats {
    pub fn new() -> StageStats {
        StageStats::default()
    }

    /// Runs `f`, charging its wall-clock time to `stage`.
    pub fn time<T>(&self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        self.record(stage, start.elapsed());
        value
    }

    /// Adds one timed call to a stage's running totals.
    pub fn record(&self, stage: &'static str, elapsed: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            let entry = entries.entry(stage).or_insert((Duration::ZERO, 0));
            entry.0 += elapsed;
            entry.1 += 1;
        }
    }

    /// Total time charged to `stage` so far.
    pub fn elapsed(&self, stage: &str) -> Duration {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(stage).map(|(total, _)| *total))
            .unwrap_or(Duration::ZERO)
    }

    /// Number of calls charged to `stage` so far.
    pub fn calls(&self, stage: &str) -> u64 {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(stage).map(|(_, count)| *count))
            .unwrap_or(0)
    }

    /// Logs every stage's totals, slowest first.
    pub fn log_summary(&self) {
        let Ok(entries) = self.entries.lock() else {
            return;
        };
        let mut rows: Vec<_> = entries.iter().collect();
        rows.sort_by(|a, b| b.1.0.cmp(&a.1.0));
        for (stage, (total, count)) in rows {
            info!(
                stage,
                total_ms = total.as_millis() as u64,
                calls = count,
                "stage timing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_accumulates_per_stage() {
        let stats = StageStats::new();
        let value = stats.time("detect", || 42);
        assert_eq!(value, 42);
        stats.time("detect", || ());
        stats.time("rectify", || ());
        assert_eq!(stats.calls("detect"), 2);
        assert_eq!(stats.calls("rectify"), 1);
        assert_eq!(stats.calls("extract"), 0);
    }

    #[test]
    fn test_record_adds_durations() {
        let stats = StageStats::new();
        stats.record("ocr", Duration::from_millis(5));
        stats.record("ocr", Duration::from_millis(7));
        assert_eq!(stats.elapsed("ocr"), Duration::from_millis(12));
    }

    #[test]
    fn test_unknown_stage_reads_as_zero() {
        let stats = StageStats::new();
        assert_eq!(stats.elapsed("nothing"), Duration::ZERO);
    }
}
