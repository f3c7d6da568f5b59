//! # bt-bench
//!
//! Drives `opensearch-benchmark` for each tuning configuration, parses its
//! CSV summary, and publishes side-by-side comparison tables.

pub mod process;
pub mod publisher;
pub mod report;

pub use process::{unique_index_name, workload_params, ProcessBenchmark, DEFAULT_PROGRAM};
pub use publisher::{ComparisonTable, PublishFormat, ResultsPublisher, METRIC_KEYS};
pub use report::{error_rate, parse_report, ERROR_RATE_METRIC};
