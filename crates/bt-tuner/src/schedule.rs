//! Schedule expressions: the values to sweep for one dimension.
//!
//! Two textual forms are accepted:
//!
//! - `start:end:step:trend` enumerates `start, start+step, ...` toward `end`,
//!   keeping only values inside the closed interval. `end` is included when it
//!   is hit exactly.
//! - `@v1:v2:...:vn` lists values verbatim, order and duplicates preserved.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use bt_types::{
    ConfigError, Dimension, DimensionInput, MlServerType, RangeDefaults, ScheduleError, TuneResult,
};

/// Upper bound on values produced by one schedule.
pub const MAX_SCHEDULE_LEN: usize = 100_000;

const EXPLICIT_MARKER: char = '@';

/// Values to sweep for a single dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// A single fixed value.
    Fixed(Decimal),
    /// Arithmetic progression from `start` toward `end`.
    Range {
        start: Decimal,
        end: Decimal,
        step: Decimal,
        /// Nonzero; carried for fidelity with the expression, not used to advance.
        trend: Decimal,
    },
    /// Literal values in the given order.
    Explicit(Vec<Decimal>),
}

impl Schedule {
    /// Parse a strict schedule expression. Range expressions need all four fields.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        Self::parse_inner(expression, None)
    }

    /// Parse a schedule expression, filling missing range fields from `defaults`.
    ///
    /// `"10"` becomes `10:<end>:<step>` with the trend implied by the direction;
    /// an empty field, as in `":300"`, takes its default too.
    pub fn parse_with_defaults(
        expression: &str,
        defaults: RangeDefaults,
    ) -> Result<Self, ScheduleError> {
        Self::parse_inner(expression, Some(defaults))
    }

    fn parse_inner(expression: &str, defaults: Option<RangeDefaults>) -> Result<Self, ScheduleError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::malformed(expression, "empty expression"));
        }

        let schedule = if let Some(list) = trimmed.strip_prefix(EXPLICIT_MARKER) {
            Self::parse_explicit(expression, list)?
        } else {
            Self::parse_range(expression, trimmed, defaults)?
        };

        // Surface empty or oversized enumerations at parse time.
        schedule.checked_values(expression)?;
        Ok(schedule)
    }

    fn parse_explicit(expression: &str, list: &str) -> Result<Self, ScheduleError> {
        if list.trim().is_empty() {
            return Err(ScheduleError::malformed(expression, "explicit list has no values"));
        }
        let values = list
            .split(':')
            .map(|field| parse_number(expression, field))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Schedule::Explicit(values))
    }

    fn parse_range(
        expression: &str,
        body: &str,
        defaults: Option<RangeDefaults>,
    ) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() > 4 {
            return Err(ScheduleError::malformed(
                expression,
                format!("expected start:end:step:trend, got {} fields", fields.len()),
            ));
        }
        if fields.len() < 4 && defaults.is_none() {
            return Err(ScheduleError::malformed(
                expression,
                "expected start:end:step:trend or @v1:v2:...",
            ));
        }

        // With defaults, an empty field takes the default.
        let field = |i: usize| {
            fields
                .get(i)
                .copied()
                .filter(|f| defaults.is_none() || !f.trim().is_empty())
        };

        let start = match (field(0), defaults) {
            (Some(f), _) => parse_number(expression, f)?,
            (None, Some(d)) => Decimal::from(d.start),
            (None, None) => return Err(ScheduleError::malformed(expression, "missing start")),
        };
        let end = match field(1) {
            Some(field) => parse_number(expression, field)?,
            None => defaults.map(|d| Decimal::from(d.end)).unwrap_or(start),
        };
        let direction = end.cmp(&start);
        let step = match field(2) {
            Some(field) => parse_number(expression, field)?,
            None => {
                let magnitude = defaults.map(|d| Decimal::from(d.step)).unwrap_or(Decimal::ONE);
                signed(magnitude, direction)
            }
        };
        let trend = match field(3) {
            Some(field) => parse_number(expression, field)?,
            None => signed(Decimal::ONE, direction),
        };

        if step.is_zero() {
            return Err(ScheduleError::malformed(expression, "step must be nonzero"));
        }
        if trend.is_zero() {
            return Err(ScheduleError::malformed(expression, "trend must be nonzero"));
        }
        let step_direction = if step.is_sign_negative() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        if direction != Ordering::Equal && step_direction != direction {
            return Err(ScheduleError::malformed(
                expression,
                format!("step {step} points away from end {end}"),
            ));
        }

        Ok(Schedule::Range {
            start,
            end,
            step,
            trend,
        })
    }

    /// Enumerate the schedule's values in sweep order.
    pub fn values(&self) -> Vec<Decimal> {
        match self {
            Schedule::Fixed(value) => vec![*value],
            Schedule::Explicit(values) => values.clone(),
            Schedule::Range {
                start, end, step, ..
            } => {
                let low = (*start).min(*end);
                let high = (*start).max(*end);
                let mut values = Vec::new();
                let mut current = *start;
                while current >= low && current <= high && values.len() <= MAX_SCHEDULE_LEN {
                    values.push(current);
                    match current.checked_add(*step) {
                        Some(next) => current = next,
                        None => break,
                    }
                }
                values
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn checked_values(&self, expression: &str) -> Result<Vec<Decimal>, ScheduleError> {
        let values = self.values();
        if values.is_empty() {
            return Err(ScheduleError::malformed(expression, "schedule yields no values"));
        }
        if values.len() > MAX_SCHEDULE_LEN {
            return Err(ScheduleError::malformed(
                expression,
                format!("schedule yields more than {MAX_SCHEDULE_LEN} values"),
            ));
        }
        Ok(values)
    }

    /// Convert the values into positive whole numbers for `dimension`.
    pub fn resolve(&self, dimension: Dimension) -> Result<Vec<u64>, ConfigError> {
        self.values()
            .into_iter()
            .map(|value| {
                if !value.fract().is_zero() {
                    return Err(ConfigError::NotWholeNumber {
                        dimension: dimension.to_string(),
                        value: value.to_string(),
                    });
                }
                match value.to_u64() {
                    Some(v) if v > 0 => Ok(v),
                    _ => Err(ConfigError::NonPositive {
                        dimension: dimension.to_string(),
                        value: value.to_string(),
                    }),
                }
            })
            .collect()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Fixed(v) => write!(f, "{v}"),
            Schedule::Range {
                start,
                end,
                step,
                trend,
            } => write!(f, "{start}:{end}:{step}:{trend}"),
            Schedule::Explicit(values) => {
                let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{EXPLICIT_MARKER}{}", joined.join(":"))
            }
        }
    }
}

fn parse_number(expression: &str, field: &str) -> Result<Decimal, ScheduleError> {
    let field = field.trim();
    if field.is_empty() {
        return Err(ScheduleError::malformed(expression, "empty field"));
    }
    Decimal::from_str(field)
        .map_err(|_| ScheduleError::malformed(expression, format!("'{field}' is not a number")))
}

fn signed(magnitude: Decimal, direction: Ordering) -> Decimal {
    if direction == Ordering::Less {
        -magnitude
    } else {
        magnitude
    }
}

/// Turn one dimension's user input into a schedule.
///
/// A schedule expression takes precedence over a fixed value. With neither,
/// the dimension's default value is used.
pub fn schedule_for(
    dimension: Dimension,
    input: &DimensionInput,
    ml_server: MlServerType,
) -> TuneResult<Schedule> {
    if input.has_schedule() {
        if let Some(value) = input.value {
            debug!(%dimension, value, "schedule takes precedence over fixed value");
        }
        let expression = input.schedule.as_deref().unwrap_or_default();
        let schedule = Schedule::parse_with_defaults(expression, dimension.range_defaults(ml_server))?;
        return Ok(schedule);
    }

    let value = input.value.unwrap_or_else(|| dimension.default_value());
    Ok(Schedule::Fixed(Decimal::from(value)))
}
