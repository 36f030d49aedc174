//! CRON parsing and next-fire prediction
//!
//! Expressions use the Quartz layout `sec min hour day-of-month month
//! day-of-week [year]`. A 6-field expression gets a trailing wildcard year
//! before parsing, and `?` ("no specific value") is read as `*`. Nothing is
//! cached: schedules are re-evaluated on every edit.

use chrono::{DateTime, Utc};
use cron::{Schedule as CronSchedule, TimeUnitSpec};
use std::str::FromStr;
use tracing::debug;

use crate::errors::CronError;

const FIELDS_WITHOUT_YEAR: usize = 6;
const FIELDS_WITH_YEAR: usize = 7;
const SECONDS_PER_MINUTE: u32 = 60;

/// A parsed and normalized CRON expression
#[derive(Debug, Clone)]
pub struct CronExpression {
    normalized: String,
    schedule: CronSchedule,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let normalized = normalize(expression);
        let invalid = |reason: String| CronError::Invalid {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = normalized.split(' ').collect();
        if fields.len() != FIELDS_WITH_YEAR {
            return Err(invalid(format!(
                "expected {} or {} fields, got {}",
                FIELDS_WITHOUT_YEAR,
                FIELDS_WITH_YEAR,
                expression.split_whitespace().count()
            )));
        }

        let parseable = fields
            .iter()
            .map(|field| if *field == "?" { "*" } else { field })
            .collect::<Vec<_>>()
            .join(" ");
        let schedule = CronSchedule::from_str(&parseable).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            normalized,
            schedule,
        })
    }

    /// The expression with its year field, as sent to the server
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// First fire strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&after).take(count).collect()
    }

    /// True when the seconds field selects every second of a minute
    /// (`*`, `*/1`, `0/1`, `0-59`, ...). Sparse seconds such as `0,1` or a
    /// short `0-5` burst are accepted.
    pub fn fires_every_second(&self) -> bool {
        self.schedule.seconds().count() == SECONDS_PER_MINUTE
    }
}

/// Append the year wildcard to a 6-field expression and collapse whitespace
pub fn normalize(expression: &str) -> String {
    let mut fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == FIELDS_WITHOUT_YEAR {
        fields.push("*");
    }
    fields.join(" ")
}

/// Next-fire computations, pure for a given "now"
pub struct CronClock;

impl CronClock {
    pub fn next_fire_time(expression: &str) -> Result<DateTime<Utc>, CronError> {
        Self::next_fire_time_after(expression, Utc::now())
    }

    pub fn next_fire_time_after(
        expression: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, CronError> {
        CronExpression::parse(expression)?
            .next_after(now)
            .ok_or_else(|| no_future_fire(expression))
    }

    pub fn next_fire_times(
        expression: &str,
        now: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, CronError> {
        Ok(CronExpression::parse(expression)?.upcoming(now, count))
    }

    /// Validate a schedule expression before it is submitted.
    ///
    /// Returns the normalized expression. Fails with `Invalid` when it does
    /// not parse or never fires again, and with `EverySecond` when it fires
    /// once per second.
    pub fn validate_at(expression: &str, now: DateTime<Utc>) -> Result<String, CronError> {
        let parsed = CronExpression::parse(expression)?;
        if parsed.next_after(now).is_none() {
            return Err(no_future_fire(expression));
        }
        if parsed.fires_every_second() {
            return Err(CronError::EverySecond {
                expression: expression.to_string(),
            });
        }
        debug!("Validated CRON '{}' as '{}'", expression, parsed.normalized());
        Ok(parsed.normalized)
    }

    pub fn validate(expression: &str) -> Result<String, CronError> {
        Self::validate_at(expression, Utc::now())
    }
}

fn no_future_fire(expression: &str) -> CronError {
    CronError::Invalid {
        expression: expression.to_string(),
        reason: "no future fire time".to_string(),
    }
}
