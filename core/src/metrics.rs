use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct RunCounters {
    total_runs: u64,
    failed_runs: u64,
    records_produced: u64,
    entities_skipped: u64,
}

#[derive(Clone)]
pub struct MetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    counters: RunCounters,
    stage_latencies: BTreeMap<String, VecDeque<u64>>, // milliseconds
    max_history: usize,
}

impl MetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                counters: RunCounters::default(),
                stage_latencies: BTreeMap::new(),
                max_history: max_history.max(1),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MetricsState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_stage(&self, stage: &str, latency_ms: u64, produced: usize, skipped: usize) {
        let mut state = self.state();
        state.counters.records_produced += produced as u64;
        state.counters.entities_skipped += skipped as u64;

        let max_history = state.max_history;
        let history = state.stage_latencies.entry(stage.to_string()).or_default();
        history.push_back(latency_ms);
        if history.len() > max_history {
            history.pop_front();
        }
    }

    pub fn record_run(&self, succeeded: bool) {
        let mut state = self.state();
        state.counters.total_runs += 1;
        if !succeeded {
            state.counters.failed_runs += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state();
        let c = &state.counters;

        let stages = state
            .stage_latencies
            .iter()
            .map(|(stage, history)| {
                let mut sorted: Vec<u64> = history.iter().copied().collect();
                sorted.sort_unstable();
                StageLatency {
                    stage: stage.clone(),
                    samples: sorted.len(),
                    p50: percentile(&sorted, 50.0),
                    p95: percentile(&sorted, 95.0),
                    p99: percentile(&sorted, 99.0),
                }
            })
            .collect();

        MetricsSnapshot {
            total_runs: c.total_runs,
            failed_runs: c.failed_runs,
            records_produced: c.records_produced,
            entities_skipped: c.entities_skipped,
            stages,
        }
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageLatency {
    pub stage: String,
    pub samples: usize,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_runs: u64,
    pub failed_runs: u64,
    pub records_produced: u64,
    pub entities_skipped: u64,
    pub stages: Vec<StageLatency>,
}

impl MetricsSnapshot {
    pub fn stage(&self, name: &str) -> Option<&StageLatency> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles_are_ordered() {
        let metrics = MetricsCollector::new(100);
        for latency in 1..=20 {
            metrics.record_stage("similarity", latency, 1, 0);
        }
        let snapshot = metrics.snapshot();
        let stage = snapshot.stage("similarity").unwrap();
        assert_eq!(stage.samples, 20);
        assert_eq!(stage.p50, 10);
        assert!(stage.p95 >= stage.p50);
        assert!(stage.p99 >= stage.p95);
        assert_eq!(snapshot.records_produced, 20);
    }

    #[test]
    fn test_history_is_bounded() {
        let metrics = MetricsCollector::new(3);
        for latency in [100, 1, 2, 3] {
            metrics.record_stage("attribution", latency, 0, 0);
        }
        let snapshot = metrics.snapshot();
        let stage = snapshot.stage("attribution").unwrap();
        assert_eq!(stage.samples, 3);
        assert_eq!(stage.p99, 3);
    }

    #[test]
    fn test_run_counters() {
        let metrics = MetricsCollector::new(10);
        metrics.record_run(true);
        metrics.record_run(false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_runs, 2);
        assert_eq!(snapshot.failed_runs, 1);
    }
}
