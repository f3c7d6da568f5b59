//! Per-configuration run results and the keyed result set of a sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use bt_types::{ConfigKey, Configuration, Dimension};

/// One row of a benchmark tool's summary report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub metric: String,
    pub task: String,
    pub value: String,
    pub unit: String,
}

/// Why a run is excluded from selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The benchmark tool reported failure.
    ToolFailure { detail: Option<String> },
    /// The observed error rate was above the allowed threshold.
    ErrorRateExceeded { error_rate: f64, allowed: f64 },
    /// The run did not finish within the per-run timeout.
    Timeout { after_secs: f64 },
    /// The collaborator could not produce an outcome at all.
    BenchmarkError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Accepted,
    Rejected(RejectReason),
}

/// Outcome of benchmarking one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Position of the configuration in generation order.
    pub sequence: usize,
    pub configuration: Configuration,
    pub status: RunStatus,
    /// Total elapsed seconds. The objective for selection.
    pub elapsed_secs: f64,
    pub error_rate: Option<f64>,
    pub metrics: Vec<MetricRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn key(&self) -> ConfigKey {
        self.configuration.key()
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.status, RunStatus::Accepted)
    }

    /// Objective value, present only for accepted runs.
    pub fn objective(&self) -> Option<f64> {
        self.is_accepted().then_some(self.elapsed_secs)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.status {
            RunStatus::Accepted => None,
            RunStatus::Rejected(reason) => Some(reason),
        }
    }

    /// Row for `name`. When several tasks report it, the last row wins.
    pub fn metric(&self, name: &str) -> Option<&MetricRecord> {
        self.metrics.iter().rev().find(|m| m.metric == name)
    }
}

/// Run results keyed by configuration identity, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSet {
    entries: Vec<RunResult>,
    #[serde(skip)]
    index: HashMap<ConfigKey, usize>,
    duplicates: Vec<ConfigKey>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. A repeated key drops the earlier result, appends the
    /// new one so iteration stays in execution order, and is remembered as a
    /// duplicate; the replaced result is returned.
    pub fn insert(&mut self, result: RunResult) -> Option<RunResult> {
        let key = result.key();
        let mut previous = None;
        if let Some(position) = self.index.remove(&key) {
            previous = Some(self.entries.remove(position));
            for slot in self.index.values_mut() {
                if *slot > position {
                    *slot -= 1;
                }
            }
            self.duplicates.push(key);
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(result);
        previous
    }

    pub fn get(&self, key: &ConfigKey) -> Option<&RunResult> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &RunResult> {
        self.entries.iter().filter(|r| r.is_accepted())
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted().count()
    }

    pub fn rejected_count(&self) -> usize {
        self.len() - self.accepted_count()
    }

    /// Keys written more than once during the sweep.
    pub fn duplicates(&self) -> &[ConfigKey] {
        &self.duplicates
    }

    /// `(dimension value, objective)` pairs of accepted runs, in execution order.
    pub fn series(&self, dimension: Dimension) -> Vec<(u64, f64)> {
        self.accepted()
            .filter_map(|r| {
                r.objective()
                    .map(|objective| (r.configuration.value(dimension), objective))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a RunResult;
    type IntoIter = std::slice::Iter<'a, RunResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bt_types::StaticParams;

    pub(crate) fn run_result(
        sequence: usize,
        triple: (u64, u64, u64),
        elapsed_secs: f64,
        status: RunStatus,
    ) -> RunResult {
        let params = StaticParams::new("/tmp", vec!["localhost:9200".into()]);
        let now = Utc::now();
        RunResult {
            sequence,
            configuration: Configuration::new(triple.0, triple.1, triple.2, params),
            status,
            elapsed_secs,
            error_rate: Some(0.0),
            metrics: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn insertion_order_is_execution_order() {
        let mut set = ResultSet::new();
        set.insert(run_result(0, (100, 1, 3), 5.0, RunStatus::Accepted));
        set.insert(run_result(1, (100, 1, 1), 4.0, RunStatus::Accepted));
        set.insert(run_result(2, (100, 1, 2), 6.0, RunStatus::Accepted));

        let batches: Vec<u64> = set.iter().map(|r| r.configuration.batch_size).collect();
        assert_eq!(batches, vec![3, 1, 2]);
        assert!(set.duplicates().is_empty());
    }

    #[test]
    fn duplicate_key_last_write_wins() {
        let mut set = ResultSet::new();
        set.insert(run_result(0, (100, 1, 10), 5.0, RunStatus::Accepted));
        set.insert(run_result(1, (100, 1, 20), 7.0, RunStatus::Accepted));
        let previous = set.insert(run_result(2, (100, 1, 10), 3.0, RunStatus::Accepted));

        assert_eq!(previous.map(|r| r.sequence), Some(0));
        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicates().len(), 1);

        let sequences: Vec<usize> = set.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        let key = run_result(0, (100, 1, 10), 0.0, RunStatus::Accepted).key();
        assert_eq!(set.get(&key).unwrap().elapsed_secs, 3.0);
        let other = run_result(0, (100, 1, 20), 0.0, RunStatus::Accepted).key();
        assert_eq!(set.get(&other).unwrap().sequence, 1);
    }

    #[test]
    fn series_contains_accepted_only() {
        let mut set = ResultSet::new();
        set.insert(run_result(0, (100, 1, 10), 5.0, RunStatus::Accepted));
        set.insert(run_result(
            1,
            (100, 1, 20),
            1.0,
            RunStatus::Rejected(RejectReason::ToolFailure { detail: None }),
        ));
        set.insert(run_result(2, (100, 1, 30), 4.0, RunStatus::Accepted));

        assert_eq!(
            set.series(Dimension::BatchSize),
            vec![(10, 5.0), (30, 4.0)]
        );
        assert_eq!(set.accepted_count(), 2);
        assert_eq!(set.rejected_count(), 1);
    }

    #[test]
    fn rejected_runs_have_no_objective() {
        let rejected = run_result(
            0,
            (1, 1, 1),
            2.0,
            RunStatus::Rejected(RejectReason::Timeout { after_secs: 2.0 }),
        );
        assert_eq!(rejected.objective(), None);
        assert!(matches!(
            rejected.reject_reason(),
            Some(RejectReason::Timeout { .. })
        ));
    }

    #[test]
    fn repeated_metric_reports_last_row() {
        let mut result = run_result(0, (100, 1, 10), 5.0, RunStatus::Accepted);
        for (task, value) in [("index-append", "900"), ("bulk", "1200")] {
            result.metrics.push(MetricRecord {
                metric: "Mean Throughput".into(),
                task: task.into(),
                value: value.into(),
                unit: "docs/s".into(),
            });
        }
        let metric = result.metric("Mean Throughput").unwrap();
        assert_eq!((metric.task.as_str(), metric.value.as_str()), ("bulk", "1200"));
        assert!(result.metric("Store size").is_none());
    }
}
