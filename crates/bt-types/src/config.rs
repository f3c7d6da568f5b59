//! Sweep settings, static benchmark parameters and concrete test configurations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::dimension::{Dimension, DimensionInput, MlServerType};
use crate::errors::{ConfigError, TuneResult};

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveDirection {
    Maximize,
    /// Total elapsed time is the default objective, so lower is better.
    #[default]
    Minimize,
}

/// How many benchmarks may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ConcurrencyMode {
    /// One benchmark at a time against the shared target cluster.
    #[default]
    Sequential,
    /// Bounded worker pool. Only valid when every run targets an isolated cluster.
    Isolated { workers: usize },
}

impl ConcurrencyMode {
    pub fn workers(&self) -> usize {
        match self {
            ConcurrencyMode::Sequential => 1,
            ConcurrencyMode::Isolated { workers } => *workers,
        }
    }
}

/// Parameters shared by every configuration of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticParams {
    pub workload_path: PathBuf,
    pub target_hosts: Vec<String>,
    #[serde(default)]
    pub client_options: Option<String>,
    /// Runs reporting an error rate above this are rejected. Same unit as the
    /// benchmark tool reports (percent for opensearch-benchmark).
    #[serde(default)]
    pub allowed_error_rate: f64,
}

impl StaticParams {
    pub fn new(workload_path: impl Into<PathBuf>, target_hosts: Vec<String>) -> Self {
        Self {
            workload_path: workload_path.into(),
            target_hosts,
            client_options: None,
            allowed_error_rate: 0.0,
        }
    }

    pub fn with_client_options(mut self, options: impl Into<String>) -> Self {
        self.client_options = Some(options.into());
        self
    }

    pub fn with_allowed_error_rate(mut self, rate: f64) -> Self {
        self.allowed_error_rate = rate;
        self
    }

    /// Hosts joined the way benchmark tools expect them on the command line.
    pub fn target_hosts_arg(&self) -> String {
        self.target_hosts.join(",")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.allowed_error_rate.is_finite()
            || self.allowed_error_rate < 0.0
            || self.allowed_error_rate > 100.0
        {
            return Err(ConfigError::InvalidErrorRate {
                value: self.allowed_error_rate,
            });
        }
        if self.target_hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::NoTargetHosts);
        }
        if !self.workload_path.exists() {
            return Err(ConfigError::WorkloadPathNotFound {
                path: self.workload_path.display().to_string(),
            });
        }
        Ok(())
    }
}

/// Identity of a configuration inside a result set: its three tunable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    pub bulk_size: u64,
    pub client_count: u64,
    pub batch_size: u64,
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk_size={},client_count={},batch_size={}",
            self.bulk_size, self.client_count, self.batch_size
        )
    }
}

/// One concrete test point of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub bulk_size: u64,
    pub client_count: u64,
    pub batch_size: u64,
    pub params: StaticParams,
}

impl Configuration {
    pub fn new(bulk_size: u64, client_count: u64, batch_size: u64, params: StaticParams) -> Self {
        Self {
            bulk_size,
            client_count,
            batch_size,
            params,
        }
    }

    pub fn key(&self) -> ConfigKey {
        ConfigKey {
            bulk_size: self.bulk_size,
            client_count: self.client_count,
            batch_size: self.batch_size,
        }
    }

    pub fn value(&self, dimension: Dimension) -> u64 {
        match dimension {
            Dimension::BulkSize => self.bulk_size,
            Dimension::ClientCount => self.client_count,
            Dimension::BatchSize => self.batch_size,
        }
    }

    /// Pre-flight checks run before any benchmark is launched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dimension in Dimension::ALL {
            let value = self.value(dimension);
            if value == 0 {
                return Err(ConfigError::NonPositive {
                    dimension: dimension.to_string(),
                    value: value.to_string(),
                });
            }
        }
        self.params.validate()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk size: {}, batch size: {}, number of clients: {}",
            self.bulk_size, self.batch_size, self.client_count
        )
    }
}

/// Cell alignment for Markdown output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumbersAlign {
    Left,
    #[default]
    Right,
}

/// Where and how the comparison table of a finished sweep is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishSettings {
    /// "csv" or "markdown".
    pub format: String,
    pub path: PathBuf,
    #[serde(default)]
    pub numbers_align: NumbersAlign,
}

/// Top-level configuration for a tuning sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    #[serde(flatten)]
    pub params: StaticParams,

    #[serde(default)]
    pub bulk_size: DimensionInput,
    #[serde(default)]
    pub client_count: DimensionInput,
    #[serde(default)]
    pub batch_size: DimensionInput,

    #[serde(default)]
    pub remote_ml_server: MlServerType,

    #[serde(default)]
    pub concurrency: ConcurrencyMode,

    /// Runs longer than this are rejected. `None` waits indefinitely.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    #[serde(default)]
    pub objective: ObjectiveDirection,

    #[serde(default)]
    pub output: Option<PublishSettings>,
}

impl SweepSettings {
    pub fn new(params: StaticParams) -> Self {
        Self {
            params,
            bulk_size: DimensionInput::default(),
            client_count: DimensionInput::default(),
            batch_size: DimensionInput::default(),
            remote_ml_server: MlServerType::Unknown,
            concurrency: ConcurrencyMode::Sequential,
            run_timeout_secs: None,
            objective: ObjectiveDirection::Minimize,
            output: None,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> TuneResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: SweepSettings = serde_json::from_str(&raw)?;
        Ok(settings)
    }

    pub fn with_dimension(mut self, dimension: Dimension, input: DimensionInput) -> Self {
        match dimension {
            Dimension::BulkSize => self.bulk_size = input,
            Dimension::ClientCount => self.client_count = input,
            Dimension::BatchSize => self.batch_size = input,
        }
        self
    }

    pub fn with_ml_server(mut self, server: MlServerType) -> Self {
        self.remote_ml_server = server;
        self
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    pub fn with_run_timeout_secs(mut self, secs: u64) -> Self {
        self.run_timeout_secs = Some(secs);
        self
    }

    pub fn with_objective(mut self, direction: ObjectiveDirection) -> Self {
        self.objective = direction;
        self
    }

    pub fn with_output(mut self, output: PublishSettings) -> Self {
        self.output = Some(output);
        self
    }

    pub fn dimension(&self, dimension: Dimension) -> &DimensionInput {
        match dimension {
            Dimension::BulkSize => &self.bulk_size,
            Dimension::ClientCount => &self.client_count,
            Dimension::BatchSize => &self.batch_size,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ConcurrencyMode::Isolated { workers: 0 } = self.concurrency {
            return Err(ConfigError::InvalidConcurrency);
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn params_in(dir: &Path) -> StaticParams {
        StaticParams::new(dir, vec!["localhost:9200".to_string()])
    }

    #[test]
    fn configuration_key_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let a = Configuration::new(100, 2, 20, params_in(dir.path()));
        let b = Configuration::new(100, 2, 20, params_in(dir.path()));
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "bulk_size=100,client_count=2,batch_size=20");
    }

    #[test]
    fn validation_rejects_non_positive_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::new(100, 0, 20, params_in(dir.path()));
        match config.validate() {
            Err(ConfigError::NonPositive { dimension, .. }) => {
                assert_eq!(dimension, "number of clients")
            }
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_missing_workload_and_hosts() {
        let missing = StaticParams::new("/definitely/not/here", vec!["h:9200".into()]);
        assert!(matches!(
            missing.validate(),
            Err(ConfigError::WorkloadPathNotFound { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let no_hosts = StaticParams::new(dir.path(), vec![]);
        assert_eq!(no_hosts.validate(), Err(ConfigError::NoTargetHosts));

        let bad_rate = params_in(dir.path()).with_allowed_error_rate(f64::NAN);
        assert!(matches!(
            bad_rate.validate(),
            Err(ConfigError::InvalidErrorRate { .. })
        ));
    }

    #[test]
    fn settings_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulktune.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "workload_path": "{}",
                "target_hosts": ["localhost:9200"],
                "allowed_error_rate": 0.5,
                "bulk_size": {{ "value": 200 }},
                "batch_size": {{ "value": 10, "schedule": "@10:20:50" }},
                "remote_ml_server": "cohere",
                "concurrency": {{ "mode": "isolated", "workers": 3 }},
                "run_timeout_secs": 600
            }}"#,
            dir.path().display()
        )
        .unwrap();

        let settings = SweepSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.bulk_size, DimensionInput::fixed(200));
        assert_eq!(settings.client_count, DimensionInput::default());
        assert!(settings.batch_size.schedule_overrides_value());
        assert_eq!(settings.remote_ml_server, MlServerType::Cohere);
        assert_eq!(settings.concurrency.workers(), 3);
        assert_eq!(settings.run_timeout_secs, Some(600));
        assert_eq!(settings.objective, ObjectiveDirection::Minimize);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SweepSettings::new(params_in(dir.path()))
            .with_concurrency(ConcurrencyMode::Isolated { workers: 0 });
        assert_eq!(settings.validate(), Err(ConfigError::InvalidConcurrency));
    }
}
