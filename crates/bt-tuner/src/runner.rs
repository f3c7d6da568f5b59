//! Runs one benchmark per configuration and applies the quality gate.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use bt_types::{BenchmarkError, Configuration, TuneResult};

use crate::result::{MetricRecord, RejectReason, RunResult, RunStatus};

/// Summary returned by a benchmark collaborator for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkOutcome {
    pub elapsed_secs: f64,
    pub error_rate: f64,
    /// Raw success indicator of the underlying tool.
    pub success: bool,
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
    /// Diagnostic text from the tool, e.g. captured stderr on failure.
    #[serde(default)]
    pub detail: Option<String>,
}

impl BenchmarkOutcome {
    pub fn succeeded(elapsed_secs: f64, error_rate: f64) -> Self {
        Self {
            elapsed_secs,
            error_rate,
            success: true,
            metrics: Vec::new(),
            detail: None,
        }
    }

    pub fn failed(elapsed_secs: f64, detail: impl Into<String>) -> Self {
        Self {
            elapsed_secs,
            error_rate: 0.0,
            success: false,
            metrics: Vec::new(),
            detail: Some(detail.into()),
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricRecord>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// External benchmark tool: run one configuration, report a summary.
///
/// Implementations should stop any child process when the returned future is
/// dropped, since cancellation and timeouts are enforced by dropping it.
#[async_trait]
pub trait Benchmark: Send + Sync {
    async fn execute(&self, config: &Configuration) -> Result<BenchmarkOutcome, BenchmarkError>;

    /// Human-readable collaborator name.
    fn name(&self) -> &str;
}

/// Accept or reject an outcome against the allowed error rate.
pub fn quality_gate(outcome: &BenchmarkOutcome, allowed_error_rate: f64) -> RunStatus {
    if !outcome.success {
        return RunStatus::Rejected(RejectReason::ToolFailure {
            detail: outcome.detail.clone(),
        });
    }
    if outcome.error_rate > allowed_error_rate || outcome.error_rate.is_nan() {
        return RunStatus::Rejected(RejectReason::ErrorRateExceeded {
            error_rate: outcome.error_rate,
            allowed: allowed_error_rate,
        });
    }
    RunStatus::Accepted
}

/// Executes single benchmark runs.
#[derive(Clone)]
pub struct BenchmarkRunner {
    benchmark: Arc<dyn Benchmark>,
    timeout: Option<Duration>,
}

impl BenchmarkRunner {
    pub fn new(benchmark: Arc<dyn Benchmark>) -> Self {
        Self {
            benchmark,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn benchmark_name(&self) -> &str {
        self.benchmark.name()
    }

    /// Pre-flight validation. Errors here are structural and abort a sweep.
    pub fn validate(&self, config: &Configuration) -> TuneResult<()> {
        config.validate()?;
        Ok(())
    }

    /// Benchmark one configuration.
    ///
    /// Only validation failures are returned as errors. Tool failures, error
    /// rates above the threshold and timeouts become rejected results.
    pub async fn run(&self, config: &Configuration, sequence: usize) -> TuneResult<RunResult> {
        self.validate(config)?;

        info!(
            sequence,
            bulk_size = config.bulk_size,
            client_count = config.client_count,
            batch_size = config.batch_size,
            benchmark = self.benchmark.name(),
            "starting benchmark run"
        );

        let started_at = Utc::now();
        let clock = Instant::now();
        let execution = self.benchmark.execute(config);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => Some(outcome),
                Err(_) => None,
            },
            None => Some(execution.await),
        };
        let wall_secs = clock.elapsed().as_secs_f64();

        let (status, elapsed_secs, error_rate, metrics) = match outcome {
            Some(Ok(outcome)) => {
                let status = quality_gate(&outcome, config.params.allowed_error_rate);
                (status, outcome.elapsed_secs, Some(outcome.error_rate), outcome.metrics)
            }
            Some(Err(e)) => {
                let reason = RejectReason::BenchmarkError {
                    message: e.to_string(),
                };
                (RunStatus::Rejected(reason), wall_secs, None, Vec::new())
            }
            None => {
                let reason = RejectReason::Timeout {
                    after_secs: wall_secs,
                };
                (RunStatus::Rejected(reason), wall_secs, None, Vec::new())
            }
        };

        match &status {
            RunStatus::Accepted => info!(sequence, elapsed_secs, ?error_rate, "benchmark run accepted"),
            RunStatus::Rejected(reason) => warn!(sequence, ?reason, "benchmark run rejected"),
        }

        Ok(RunResult {
            sequence,
            configuration: config.clone(),
            status,
            elapsed_secs,
            error_rate,
            metrics,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for BenchmarkRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkRunner")
            .field("benchmark", &self.benchmark.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bt_types::{ConfigError, StaticParams, TuneError};
    use std::collections::HashMap;

    /// Deterministic collaborator keyed by batch size.
    pub(crate) struct FakeBenchmark {
        pub outcomes: HashMap<u64, Result<BenchmarkOutcome, String>>,
        pub delay: Option<Duration>,
    }

    impl FakeBenchmark {
        pub(crate) fn with_times(times: &[(u64, f64)]) -> Self {
            Self {
                outcomes: times
                    .iter()
                    .map(|(batch, secs)| (*batch, Ok(BenchmarkOutcome::succeeded(*secs, 0.0))))
                    .collect(),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Benchmark for FakeBenchmark {
        async fn execute(&self, config: &Configuration) -> Result<BenchmarkOutcome, BenchmarkError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.outcomes.get(&config.batch_size) {
                Some(Ok(outcome)) => Ok(outcome.clone()),
                Some(Err(message)) => Err(BenchmarkError::ExecutionFailed {
                    message: message.clone(),
                }),
                None => Ok(BenchmarkOutcome::succeeded(config.batch_size as f64, 0.0)),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    pub(crate) fn config_in(dir: &std::path::Path, batch_size: u64) -> Configuration {
        let params = StaticParams::new(dir, vec!["localhost:9200".into()]).with_allowed_error_rate(1.0);
        Configuration::new(100, 1, batch_size, params)
    }

    #[test]
    fn quality_gate_rules() {
        let ok = BenchmarkOutcome::succeeded(10.0, 0.5);
        assert_eq!(quality_gate(&ok, 1.0), RunStatus::Accepted);
        assert_eq!(quality_gate(&ok, 0.5), RunStatus::Accepted);
        assert!(matches!(
            quality_gate(&ok, 0.4),
            RunStatus::Rejected(RejectReason::ErrorRateExceeded { .. })
        ));

        let failed = BenchmarkOutcome::failed(3.0, "boom");
        assert!(matches!(
            quality_gate(&failed, 100.0),
            RunStatus::Rejected(RejectReason::ToolFailure { .. })
        ));
    }

    #[tokio::test]
    async fn accepted_run_carries_objective() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BenchmarkRunner::new(Arc::new(FakeBenchmark::with_times(&[(10, 42.0)])));
        let result = runner.run(&config_in(dir.path(), 10), 0).await.unwrap();
        assert!(result.is_accepted());
        assert_eq!(result.objective(), Some(42.0));
        assert_eq!(result.error_rate, Some(0.0));
    }

    #[tokio::test]
    async fn error_rate_above_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBenchmark::with_times(&[]);
        fake.outcomes
            .insert(10, Ok(BenchmarkOutcome::succeeded(5.0, 2.5)));
        let runner = BenchmarkRunner::new(Arc::new(fake));
        let result = runner.run(&config_in(dir.path(), 10), 0).await.unwrap();
        match result.reject_reason() {
            Some(RejectReason::ErrorRateExceeded { error_rate, allowed }) => {
                assert_eq!(*error_rate, 2.5);
                assert_eq!(*allowed, 1.0);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn collaborator_error_becomes_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBenchmark::with_times(&[]);
        fake.outcomes.insert(10, Err("exit status 1".into()));
        let runner = BenchmarkRunner::new(Arc::new(fake));
        let result = runner.run(&config_in(dir.path(), 10), 3).await.unwrap();
        assert_eq!(result.sequence, 3);
        assert!(matches!(
            result.reject_reason(),
            Some(RejectReason::BenchmarkError { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBenchmark::with_times(&[]);
        fake.delay = Some(Duration::from_secs(3600));
        let runner =
            BenchmarkRunner::new(Arc::new(fake)).with_timeout(Duration::from_secs(60));
        let result = runner.run(&config_in(dir.path(), 10), 0).await.unwrap();
        assert!(matches!(
            result.reject_reason(),
            Some(RejectReason::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_configuration_fails_fast() {
        let params = StaticParams::new("/no/such/workload", vec!["localhost:9200".into()]);
        let config = Configuration::new(100, 1, 10, params);
        let runner = BenchmarkRunner::new(Arc::new(FakeBenchmark::with_times(&[])));
        match runner.run(&config, 0).await {
            Err(TuneError::Config(ConfigError::WorkloadPathNotFound { .. })) => (),
            other => panic!("expected workload path error, got {other:?}"),
        }
    }
}
