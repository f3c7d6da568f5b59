use thiserror::Error;

/// Main error type for the bulktune system
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Schedule expression errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Malformed schedule '{expression}': {reason}")]
    Malformed { expression: String, reason: String },
}

impl ScheduleError {
    pub fn malformed(expression: &str, reason: impl Into<String>) -> Self {
        ScheduleError::Malformed {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Pre-flight configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Workload path does not exist: {path}")]
    WorkloadPathNotFound { path: String },

    #[error("No target hosts specified")]
    NoTargetHosts,

    #[error("{dimension} must be positive, got {value}")]
    NonPositive { dimension: String, value: String },

    #[error("{dimension} must be a whole number, got {value}")]
    NotWholeNumber { dimension: String, value: String },

    #[error("Allowed error rate must be a finite value in [0, 100], got {value}")]
    InvalidErrorRate { value: f64 },

    #[error("Isolated concurrency needs at least one worker")]
    InvalidConcurrency,

    #[error("Sweep of {total} configurations exceeds the limit of {limit}")]
    SweepTooLarge { total: u128, limit: usize },
}

/// Per-run failures reported by a benchmark collaborator
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Failed to launch benchmark '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Benchmark I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable benchmark results: {message}")]
    Results { message: String },

    #[error("Benchmark execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Result publishing errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Unknown publish format '{format}'")]
    UnknownFormat { format: String },

    #[error("Failed to write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode results as CSV: {message}")]
    Csv { message: String },
}

/// Result type alias for bulktune operations
pub type TuneResult<T> = Result<T, TuneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ScheduleError::malformed("10:x", "'x' is not a number");
        assert!(error.to_string().contains("10:x"));
        assert!(error.to_string().contains("not a number"));

        let error = ConfigError::NonPositive {
            dimension: "bulk size".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(error.to_string(), "bulk size must be positive, got 0");
    }

    #[test]
    fn test_error_conversion() {
        let tune_error: TuneError = ConfigError::NoTargetHosts.into();
        match tune_error {
            TuneError::Config(ConfigError::NoTargetHosts) => (),
            other => panic!("Expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_sweep_limit_display() {
        let error = ConfigError::SweepTooLarge {
            total: 1_000_000_000,
            limit: 1_000_000,
        };
        assert_eq!(
            error.to_string(),
            "Sweep of 1000000000 configurations exceeds the limit of 1000000"
        );
    }
}
