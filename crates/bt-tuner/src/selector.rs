//! Optimal configuration selection over a result set.

use serde::Serialize;
use tracing::warn;

use bt_types::ObjectiveDirection;

use crate::result::{ResultSet, RunResult};

/// Outcome of selection. "No eligible result" is a normal, displayable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    Best(RunResult),
    NoEligibleResult,
}

impl Selection {
    pub fn best(&self) -> Option<&RunResult> {
        match self {
            Selection::Best(result) => Some(result),
            Selection::NoEligibleResult => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::NoEligibleResult)
    }
}

/// True when `candidate` strictly beats `current` in `direction`.
fn improves(direction: ObjectiveDirection, candidate: f64, current: f64) -> bool {
    match direction {
        ObjectiveDirection::Maximize => candidate > current,
        ObjectiveDirection::Minimize => candidate < current,
    }
}

/// Pick the accepted result with the extremal objective.
///
/// Rejected results are ineligible. Ties keep the earliest result in
/// execution order.
pub fn select_best(results: &ResultSet, direction: ObjectiveDirection) -> Selection {
    let mut best: Option<(&RunResult, f64)> = None;

    for result in results.accepted() {
        let Some(objective) = result.objective() else {
            continue;
        };
        if objective.is_nan() {
            continue;
        }
        let replace = match best {
            None => true,
            Some((current_result, current)) => {
                improves(direction, objective, current)
                    || (objective == current && result.sequence < current_result.sequence)
            }
        };
        if replace {
            best = Some((result, objective));
        }
    }

    match best {
        Some((result, _)) => Selection::Best(result.clone()),
        None => {
            warn!(
                total = results.len(),
                "no eligible result; every run was rejected"
            );
            Selection::NoEligibleResult
        }
    }
}
