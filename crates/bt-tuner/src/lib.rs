//! # bt-tuner
//!
//! Parameter-sweep tuning engine for bulk ingestion.
//!
//! Parses per-dimension schedules, expands them into ordered test
//! configurations, benchmarks each configuration behind a quality gate, and
//! selects the configuration with the best objective.

mod generator;
mod result;
mod runner;
mod schedule;
mod selector;
mod sweep;
mod tuning;

pub use generator::{duplicate_keys, CombinationGenerator, MAX_SWEEP_LEN};
pub use result::{MetricRecord, RejectReason, ResultSet, RunResult, RunStatus};
pub use runner::{quality_gate, Benchmark, BenchmarkOutcome, BenchmarkRunner};
pub use schedule::{schedule_for, Schedule, MAX_SCHEDULE_LEN};
pub use selector::{select_best, Selection};
pub use sweep::{
    ProgressHandle, SweepCancel, SweepController, SweepEvent, SweepId, SweepProgress, SweepReport,
    SweepState,
};
pub use tuning::{Tuner, TuningReport};
