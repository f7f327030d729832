//! Cron expression parsing and fire-time computation.
//!
//! Supports six-field cron expressions (seconds, minutes, hours, day-of-month,
//! month, day-of-week) with an optional seventh year field. The `?` placeholder
//! commonly used in day fields is accepted and treated as a wildcard.
//!
//! Evaluation is pure: the same expression and reference instant always yield
//! the same next fire instant.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing a cron expression.
///
/// Parsing happens once, at trigger-creation time. Evaluation of an already
/// parsed expression cannot fail; it only runs out of occurrences.
#[derive(Debug, Error)]
pub enum CronError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidExpression(String),

    /// Invalid timezone.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// A parsed, timezone-aware cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    /// The original expression string.
    expression: String,
    /// The timezone the fields are evaluated in.
    timezone: Tz,
    schedule: Schedule,
}

impl CronExpr {
    /// Parse a cron expression, evaluated in UTC.
    pub fn parse(expression: impl Into<String>) -> Result<Self, CronError> {
        Self::with_timezone(expression, "UTC")
    }

    /// Parse a cron expression evaluated in a specific timezone.
    pub fn with_timezone(
        expression: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Result<Self, CronError> {
        let expression = expression.into();
        let timezone = timezone.into();

        let tz: Tz = timezone
            .parse()
            .map_err(|_| CronError::InvalidTimezone(timezone))?;

        let schedule = Self::compile(&expression)?;

        Ok(Self {
            expression,
            timezone: tz,
            schedule,
        })
    }

    /// Compile the expression string into a schedule.
    fn compile(expression: &str) -> Result<Schedule, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();

        if !(6..=7).contains(&fields.len()) {
            return Err(CronError::InvalidExpression(format!(
                "expected 6 or 7 fields, got {}",
                fields.len()
            )));
        }

        // `?` in day-of-month/day-of-week means "no specific value"; it is
        // equivalent to a wildcard for evaluation purposes.
        let normalized: Vec<&str> = fields
            .iter()
            .map(|f| if *f == "?" { "*" } else { *f })
            .collect();

        Schedule::from_str(&normalized.join(" "))
            .map_err(|e| CronError::InvalidExpression(e.to_string()))
    }

    /// Next occurrence strictly after the given instant, or `None` if the
    /// expression has no further occurrences.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Next occurrence at or after the given instant.
    ///
    /// Used when arming a trigger with a start instant: the start boundary
    /// itself is a valid first fire time.
    pub fn next_from(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Occurrences land on whole seconds; a sub-second instant rounds up
        // so the preceding boundary is never returned.
        let on_second = match from.with_nanosecond(0) {
            Some(t) if t == from => t,
            Some(t) => t + Duration::seconds(1),
            None => return self.next_after(from),
        };
        if self.schedule.includes(on_second.with_timezone(&self.timezone)) {
            return Some(on_second);
        }
        self.next_after(from)
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Get the timezone name.
    pub fn timezone(&self) -> &str {
        self.timezone.name()
    }
}
