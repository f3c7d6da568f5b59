//! Cartesian product of the three dimension schedules.

use std::collections::HashSet;
use tracing::warn;

use bt_types::{ConfigError, ConfigKey, Configuration, Dimension, StaticParams, TuneResult};

use crate::schedule::Schedule;

/// Upper bound on the configurations one sweep may plan.
pub const MAX_SWEEP_LEN: usize = 1_000_000;

/// Ordered test configurations built from one schedule per dimension.
///
/// Nesting is bulk size (outermost), client count, batch size (innermost), so
/// batch size varies fastest.
#[derive(Debug, Clone)]
pub struct CombinationGenerator {
    bulk_sizes: Vec<u64>,
    client_counts: Vec<u64>,
    batch_sizes: Vec<u64>,
}

impl CombinationGenerator {
    /// Fails when the product of the three schedules exceeds [`MAX_SWEEP_LEN`].
    pub fn new(bulk: &Schedule, clients: &Schedule, batch: &Schedule) -> TuneResult<Self> {
        let generator = Self {
            bulk_sizes: bulk.resolve(Dimension::BulkSize)?,
            client_counts: clients.resolve(Dimension::ClientCount)?,
            batch_sizes: batch.resolve(Dimension::BatchSize)?,
        };
        match generator.checked_total() {
            Some(total) if total <= MAX_SWEEP_LEN => Ok(generator),
            _ => {
                let total = [
                    &generator.bulk_sizes,
                    &generator.client_counts,
                    &generator.batch_sizes,
                ]
                .iter()
                .fold(1u128, |acc, values| acc.saturating_mul(values.len() as u128));
                Err(ConfigError::SweepTooLarge {
                    total,
                    limit: MAX_SWEEP_LEN,
                }
                .into())
            }
        }
    }

    fn checked_total(&self) -> Option<usize> {
        self.bulk_sizes
            .len()
            .checked_mul(self.client_counts.len())?
            .checked_mul(self.batch_sizes.len())
    }

    pub fn values(&self, dimension: Dimension) -> &[u64] {
        match dimension {
            Dimension::BulkSize => &self.bulk_sizes,
            Dimension::ClientCount => &self.client_counts,
            Dimension::BatchSize => &self.batch_sizes,
        }
    }

    /// Number of configurations [`generate`](Self::generate) will produce.
    pub fn total(&self) -> usize {
        self.checked_total().unwrap_or(usize::MAX)
    }

    /// Dimensions with more than one value.
    pub fn varying_dimensions(&self) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|d| self.values(*d).len() > 1)
            .collect()
    }

    pub fn generate(&self, params: &StaticParams) -> Vec<Configuration> {
        let mut configurations = Vec::with_capacity(self.total());
        for &bulk_size in &self.bulk_sizes {
            for &client_count in &self.client_counts {
                for &batch_size in &self.batch_sizes {
                    configurations.push(Configuration::new(
                        bulk_size,
                        client_count,
                        batch_size,
                        params.clone(),
                    ));
                }
            }
        }

        let duplicates = duplicate_keys(&configurations);
        if !duplicates.is_empty() {
            warn!(
                count = duplicates.len(),
                "schedules produce repeated configurations; later runs overwrite earlier results"
            );
        }
        configurations
    }
}

/// Keys that occur more than once, in order of their second occurrence.
pub fn duplicate_keys(configurations: &[Configuration]) -> Vec<ConfigKey> {
    let mut seen = HashSet::new();
    configurations
        .iter()
        .map(Configuration::key)
        .filter(|key| !seen.insert(*key))
        .collect()
}
