use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bt_bench::{ProcessBenchmark, ResultsPublisher};
use bt_tuner::Tuner;
use bt_types::SweepSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("BULKTUNE_CONFIG").unwrap_or_else(|_| "bulktune.json".to_string());
    let settings = SweepSettings::from_json_file(&config_path)
        .with_context(|| format!("loading sweep settings from {config_path}"))?;

    let mut benchmark = ProcessBenchmark::new();
    if let Ok(program) = std::env::var("BULKTUNE_BENCHMARK_BIN") {
        benchmark = benchmark.with_program(program);
    }

    let output = settings.output.clone();
    let tuner = Tuner::new(settings, Arc::new(benchmark));

    let cancel = tuner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling sweep");
            cancel.cancel();
        }
    });

    let report = tuner.run().await?;

    if let Some(output) = output {
        ResultsPublisher::new(output).publish(&report.sweep.results)?;
    }
    if let Ok(path) = std::env::var("BULKTUNE_REPORT") {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).with_context(|| format!("writing report to {path}"))?;
        info!(%path, "tuning report written");
    }

    let results = &report.sweep.results;
    info!(
        state = ?report.sweep.state,
        runs = results.len(),
        accepted = results.accepted_count(),
        rejected = results.rejected_count(),
        "sweep finished"
    );

    match report.best.best() {
        Some(best) => println!(
            "Optimal variable combination: {} ({:.3}s)",
            best.configuration, best.elapsed_secs
        ),
        None => println!("All tests failed, couldn't find any results!"),
    }
    Ok(())
}
