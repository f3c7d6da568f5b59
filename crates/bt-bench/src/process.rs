//! Benchmark collaborator backed by the `opensearch-benchmark` command line tool.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error};
use uuid::Uuid;

use bt_tuner::{Benchmark, BenchmarkOutcome};
use bt_types::{BenchmarkError, Configuration};

use crate::report;

pub const DEFAULT_PROGRAM: &str = "opensearch-benchmark";

const NODE_STATS_PARAMS: &str = "node-stats-include-indices:true,\
node-stats-sample-interval:10,\
node-stats-include-mem:true,\
node-stats-include-process:true";

/// Runs `opensearch-benchmark execute-test` once per configuration against a
/// remote cluster and reads back its CSV summary.
#[derive(Debug, Clone)]
pub struct ProcessBenchmark {
    program: String,
    telemetry: bool,
}

impl ProcessBenchmark {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            telemetry: true,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Disable node-stats telemetry collection.
    pub fn without_telemetry(mut self) -> Self {
        self.telemetry = false;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for one run. Each run writes into a fresh index.
    pub fn command_args(
        &self,
        config: &Configuration,
        results_file: &Path,
        index_name: &str,
    ) -> Vec<String> {
        let params = &config.params;
        let mut args = vec![
            "execute-test".to_string(),
            "--target-hosts".to_string(),
            params.target_hosts_arg(),
        ];
        if let Some(options) = &params.client_options {
            args.push("--client-options".to_string());
            args.push(options.clone());
        }
        args.push("--kill-running-processes".to_string());
        // Only remote clusters are tuned.
        args.push("--pipeline".to_string());
        args.push("benchmark-only".to_string());
        if self.telemetry {
            args.push("--telemetry".to_string());
            args.push("node-stats".to_string());
            args.push("--telemetry-params".to_string());
            args.push(NODE_STATS_PARAMS.to_string());
        }
        args.push("--workload-path".to_string());
        args.push(params.workload_path.display().to_string());
        args.push("--workload-params".to_string());
        args.push(workload_params(config, index_name));
        args.push("--results-format".to_string());
        args.push("csv".to_string());
        args.push("--results-file".to_string());
        args.push(results_file.display().to_string());
        args
    }
}

impl Default for ProcessBenchmark {
    fn default() -> Self {
        Self::new()
    }
}

/// Workload parameters understood by the bulk-ingestion workloads.
pub fn workload_params(config: &Configuration, index_name: &str) -> String {
    format!(
        "bulk_size:{},batch_size:{},bulk_indexing_clients:{},index_name:{}",
        config.bulk_size, config.batch_size, config.client_count, index_name
    )
}

pub fn unique_index_name() -> String {
    format!("{}_{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}

#[async_trait]
impl Benchmark for ProcessBenchmark {
    async fn execute(&self, config: &Configuration) -> Result<BenchmarkOutcome, BenchmarkError> {
        // Removed when dropped, including on cancellation.
        let results_file = tempfile::NamedTempFile::new()?;
        let index_name = unique_index_name();
        let args = self.command_args(config, results_file.path(), &index_name);
        debug!(program = %self.program, ?args, "launching benchmark");

        let clock = Instant::now();
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BenchmarkError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let elapsed_secs = clock.elapsed().as_secs_f64();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(status = %output.status, %stderr, "benchmark process failed");
            return Ok(BenchmarkOutcome::failed(
                elapsed_secs,
                format!("{}: {stderr}", output.status),
            ));
        }

        let raw = tokio::fs::read_to_string(results_file.path()).await?;
        let metrics = report::parse_report(&raw)?;
        let error_rate = report::error_rate(&metrics)?;

        Ok(BenchmarkOutcome::succeeded(elapsed_secs, error_rate).with_metrics(metrics))
    }

    fn name(&self) -> &str {
        &self.program
    }
}
