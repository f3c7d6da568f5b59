//! End-to-end tuning: settings in, sweep report and optimal configuration out.

use crossbeam_channel::Sender;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use bt_types::{Configuration, Dimension, SweepSettings, TuneResult};

use crate::generator::CombinationGenerator;
use crate::runner::{Benchmark, BenchmarkRunner};
use crate::schedule::schedule_for;
use crate::selector::{select_best, Selection};
use crate::sweep::{ProgressHandle, SweepCancel, SweepController, SweepEvent, SweepReport};

/// Result of a tuning session.
#[derive(Debug, Clone, Serialize)]
pub struct TuningReport {
    pub sweep: SweepReport,
    pub best: Selection,
    /// Dimensions that took more than one value, for plotting.
    pub varying: Vec<Dimension>,
}

/// Resolves settings into configurations and runs the sweep.
pub struct Tuner {
    settings: SweepSettings,
    controller: SweepController,
}

impl Tuner {
    pub fn new(settings: SweepSettings, benchmark: Arc<dyn Benchmark>) -> Self {
        let mut runner = BenchmarkRunner::new(benchmark);
        if let Some(secs) = settings.run_timeout_secs {
            runner = runner.with_timeout(Duration::from_secs(secs));
        }
        let controller = SweepController::new(runner).with_concurrency(settings.concurrency);
        Self {
            settings,
            controller,
        }
    }

    pub fn with_events(mut self, events: Sender<SweepEvent>) -> Self {
        self.controller = self.controller.with_events(events);
        self
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    pub fn cancel_handle(&self) -> SweepCancel {
        self.controller.cancel_handle()
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.controller.progress_handle()
    }

    /// Build the combination generator from the three dimension inputs.
    pub fn generator(&self) -> TuneResult<CombinationGenerator> {
        let ml_server = self.settings.remote_ml_server;
        let bulk = schedule_for(
            Dimension::BulkSize,
            self.settings.dimension(Dimension::BulkSize),
            ml_server,
        )?;
        let clients = schedule_for(
            Dimension::ClientCount,
            self.settings.dimension(Dimension::ClientCount),
            ml_server,
        )?;
        let batch = schedule_for(
            Dimension::BatchSize,
            self.settings.dimension(Dimension::BatchSize),
            ml_server,
        )?;
        CombinationGenerator::new(&bulk, &clients, &batch)
    }

    /// Configurations the sweep will run, in order.
    pub fn plan(&self) -> TuneResult<(CombinationGenerator, Vec<Configuration>)> {
        self.settings.validate()?;
        let generator = self.generator()?;
        let configurations = generator.generate(&self.settings.params);

        info!(
            total = generator.total(),
            bulk_sizes = generator.values(Dimension::BulkSize).len(),
            client_counts = generator.values(Dimension::ClientCount).len(),
            batch_sizes = generator.values(Dimension::BatchSize).len(),
            "planned tuning sweep"
        );
        Ok((generator, configurations))
    }

    pub async fn run(&self) -> TuneResult<TuningReport> {
        let (generator, configurations) = self.plan()?;
        let sweep = self.controller.sweep(configurations).await?;
        let best = select_best(&sweep.results, self.settings.objective);

        match best.best() {
            Some(result) => info!(
                bulk_size = result.configuration.bulk_size,
                batch_size = result.configuration.batch_size,
                client_count = result.configuration.client_count,
                elapsed_secs = result.elapsed_secs,
                "optimal variable combination found"
            ),
            None => warn!("all tests failed, no optimal combination found"),
        }

        Ok(TuningReport {
            sweep,
            best,
            varying: generator.varying_dimensions(),
        })
    }
}
