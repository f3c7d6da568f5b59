//! The three tunable ingestion dimensions and their defaults.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the tunable variables of an ingestion sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Documents per client-side bulk request.
    BulkSize,
    /// Concurrent request-issuing clients.
    ClientCount,
    /// Server-side batch size for ingest processors.
    BatchSize,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [
        Dimension::BulkSize,
        Dimension::ClientCount,
        Dimension::BatchSize,
    ];

    /// Value used when neither a fixed value nor a schedule is configured.
    pub fn default_value(&self) -> u64 {
        match self {
            Dimension::BulkSize => 100,
            Dimension::ClientCount => 1,
            Dimension::BatchSize => 100,
        }
    }

    /// Defaults filled into shorthand range expressions.
    pub fn range_defaults(&self, ml_server: MlServerType) -> RangeDefaults {
        match self {
            Dimension::BulkSize => RangeDefaults {
                start: 100,
                end: 1000,
                step: 100,
            },
            Dimension::ClientCount => RangeDefaults {
                start: 1,
                end: 10,
                step: 1,
            },
            Dimension::BatchSize => RangeDefaults {
                start: 1,
                end: ml_server.recommended_max_batch_size(),
                step: 20,
            },
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::BulkSize => "bulk size",
            Dimension::ClientCount => "number of clients",
            Dimension::BatchSize => "batch size",
        };
        f.write_str(name)
    }
}

/// Start, end and step used when a range expression leaves fields out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDefaults {
    pub start: u64,
    pub end: u64,
    pub step: u64,
}

/// Remote model server behind the ingest pipeline. Bounds useful batch sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MlServerType {
    #[serde(alias = "sage_maker")]
    SageMaker,
    Cohere,
    #[serde(alias = "open_ai")]
    OpenAi,
    #[default]
    Unknown,
}

impl MlServerType {
    pub fn recommended_max_batch_size(&self) -> u64 {
        match self {
            // No documented limit; conservative cap.
            MlServerType::SageMaker => 100,
            MlServerType::Cohere => 96,
            MlServerType::OpenAi => 2048,
            MlServerType::Unknown => 200,
        }
    }
}

/// User input for one dimension: a fixed value, a schedule expression, both, or neither.
///
/// When both are given the schedule wins. When neither is given the dimension
/// default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionInput {
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub schedule: Option<String>,
}

impl DimensionInput {
    pub fn fixed(value: u64) -> Self {
        Self {
            value: Some(value),
            schedule: None,
        }
    }

    pub fn scheduled(expression: impl Into<String>) -> Self {
        Self {
            value: None,
            schedule: Some(expression.into()),
        }
    }

    pub fn with_schedule(mut self, expression: impl Into<String>) -> Self {
        self.schedule = Some(expression.into());
        self
    }

    /// True when a fixed value is supplied but ignored in favour of the schedule.
    pub fn schedule_overrides_value(&self) -> bool {
        self.value.is_some() && self.has_schedule()
    }

    pub fn has_schedule(&self) -> bool {
        self.schedule
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}
