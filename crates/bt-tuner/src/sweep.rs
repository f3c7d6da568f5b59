//! Sweep controller: drives the runner over every configuration.
//!
//! Results are recorded in generation order whatever the completion order.
//! Progress is observable through a [`ProgressHandle`] and, optionally, a
//! channel of [`SweepEvent`]s. A sweep can be cancelled through its
//! [`SweepCancel`] handle; the in-flight run is dropped and not recorded.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use bt_types::{ConcurrencyMode, Configuration, TuneError, TuneResult};

use crate::result::{ResultSet, RunResult};
use crate::runner::BenchmarkRunner;

/// Unique sweep identifier.
pub type SweepId = Uuid;

/// Lifecycle state of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Counters observable while a sweep runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepProgress {
    pub state: SweepState,
    pub total: usize,
    pub completed: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl SweepProgress {
    fn new() -> Self {
        Self {
            state: SweepState::Pending,
            total: 0,
            completed: 0,
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Read-only view of a sweep's progress.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    inner: Arc<RwLock<SweepProgress>>,
}

impl ProgressHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SweepProgress::new())),
        }
    }

    pub fn snapshot(&self) -> SweepProgress {
        self.inner.read().clone()
    }

    fn update(&self, f: impl FnOnce(&mut SweepProgress)) -> SweepProgress {
        let mut progress = self.inner.write();
        f(&mut progress);
        progress.clone()
    }
}

/// Cooperative cancellation for a running sweep.
#[derive(Debug, Clone)]
pub struct SweepCancel {
    tx: Arc<watch::Sender<bool>>,
}

impl SweepCancel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for SweepCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Events emitted while a sweep runs.
#[derive(Debug, Clone, Serialize)]
pub enum SweepEvent {
    Started {
        sweep_id: SweepId,
        total: usize,
    },
    RunRecorded {
        progress: SweepProgress,
        result: RunResult,
    },
    Finished {
        sweep_id: SweepId,
        progress: SweepProgress,
    },
}

/// Everything a finished, cancelled or partially failed sweep produced.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep_id: SweepId,
    pub state: SweepState,
    pub total: usize,
    pub results: ResultSet,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    /// True only when every configuration was benchmarked.
    pub fn is_complete(&self) -> bool {
        self.state == SweepState::Completed
    }
}

/// Drives a [`BenchmarkRunner`] over an ordered list of configurations.
pub struct SweepController {
    runner: BenchmarkRunner,
    concurrency: ConcurrencyMode,
    cancel: SweepCancel,
    progress: ProgressHandle,
    events: Option<Sender<SweepEvent>>,
}

impl SweepController {
    pub fn new(runner: BenchmarkRunner) -> Self {
        Self {
            runner,
            concurrency: ConcurrencyMode::Sequential,
            cancel: SweepCancel::new(),
            progress: ProgressHandle::new(),
            events: None,
        }
    }

    /// Allow several runs at once. Only sound when runs target isolated clusters.
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    /// Share a cancellation handle created before the controller.
    pub fn with_cancel(mut self, cancel: SweepCancel) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Sender<SweepEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_handle(&self) -> SweepCancel {
        self.cancel.clone()
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Benchmark every configuration, in order.
    ///
    /// Structural errors are returned before any benchmark starts. Per-run
    /// failures are recorded as rejected results and the sweep continues.
    pub async fn sweep(&self, configurations: Vec<Configuration>) -> TuneResult<SweepReport> {
        let sweep_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = configurations.len();

        self.progress.update(|p| {
            p.total = total;
            p.state = SweepState::Running;
        });

        for config in &configurations {
            if let Err(e) = self.runner.validate(config) {
                self.fail(&e);
                return Err(e);
            }
        }

        info!(%sweep_id, total, concurrency = ?self.concurrency, "sweep started");
        self.emit(SweepEvent::Started { sweep_id, total });

        let mut results = ResultSet::new();
        let outcome = match self.concurrency {
            ConcurrencyMode::Sequential => self.run_sequential(configurations, &mut results).await,
            ConcurrencyMode::Isolated { workers } => {
                self.run_pooled(configurations, workers.max(1), &mut results)
                    .await
            }
        };

        let state = match outcome {
            Ok(state) => state,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        let progress = self.progress.update(|p| p.state = state);
        match state {
            SweepState::Cancelled => warn!(
                %sweep_id,
                completed = progress.completed,
                total,
                "sweep cancelled before completion"
            ),
            _ => info!(
                %sweep_id,
                accepted = progress.accepted,
                rejected = progress.rejected,
                "sweep completed"
            ),
        }
        self.emit(SweepEvent::Finished { sweep_id, progress });

        Ok(SweepReport {
            sweep_id,
            state,
            total,
            results,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_sequential(
        &self,
        configurations: Vec<Configuration>,
        results: &mut ResultSet,
    ) -> TuneResult<SweepState> {
        for (sequence, config) in configurations.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(SweepState::Cancelled);
            }
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(SweepState::Cancelled),
                result = self.runner.run(config, sequence) => result?,
            };
            self.record(result, results);
        }
        Ok(SweepState::Completed)
    }

    async fn run_pooled(
        &self,
        configurations: Vec<Configuration>,
        workers: usize,
        results: &mut ResultSet,
    ) -> TuneResult<SweepState> {
        let total = configurations.len();
        let mut pending = configurations.into_iter().enumerate();
        let mut slots: Vec<Option<RunResult>> = vec![None; total];
        let mut next_to_record = 0;
        let mut tasks = JoinSet::new();
        let mut state = SweepState::Completed;

        loop {
            while tasks.len() < workers && !self.cancel.is_cancelled() {
                let Some((sequence, config)) = pending.next() else {
                    break;
                };
                let runner = self.runner.clone();
                tasks.spawn(async move { runner.run(&config, sequence).await });
            }
            if tasks.is_empty() {
                if self.cancel.is_cancelled() && next_to_record < total {
                    state = SweepState::Cancelled;
                }
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    state = SweepState::Cancelled;
                    break;
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                continue;
            };
            let result = match joined {
                Ok(result) => result,
                Err(join_error) => {
                    tasks.abort_all();
                    return Err(TuneError::Internal(format!(
                        "benchmark task panicked: {join_error}"
                    )));
                }
            };
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            };

            let sequence = result.sequence;
            slots[sequence] = Some(result);
            while next_to_record < total {
                match slots[next_to_record].take() {
                    Some(result) => {
                        self.record(result, results);
                        next_to_record += 1;
                    }
                    None => break,
                }
            }
        }

        // Runs that finished after a gap left by a cancelled run.
        for result in slots.into_iter().flatten() {
            self.record(result, results);
        }
        Ok(state)
    }

    fn record(&self, result: RunResult, results: &mut ResultSet) {
        let accepted = result.is_accepted();
        let progress = self.progress.update(|p| {
            p.completed += 1;
            if accepted {
                p.accepted += 1;
            } else {
                p.rejected += 1;
            }
        });

        if let Some(previous) = results.insert(result.clone()) {
            warn!(
                key = %previous.key(),
                previous_sequence = previous.sequence,
                sequence = result.sequence,
                "duplicate configuration; keeping the later result"
            );
        }

        info!(completed = progress.completed, total = progress.total, "sweep progress");
        self.emit(SweepEvent::RunRecorded { progress, result });
    }

    fn fail(&self, e: &TuneError) {
        error!(error = %e, "sweep aborted");
        self.progress.update(|p| p.state = SweepState::Failed);
    }

    fn emit(&self, event: SweepEvent) {
        if let Some(events) = &self.events {
            // Best-effort send; a dropped receiver must not stop the sweep.
            let _ = events.try_send(event);
        }
    }
}
