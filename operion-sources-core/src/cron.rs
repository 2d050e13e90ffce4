//! Pure cron-expression evaluation.
//!
//! Kept free of any wall-clock timer so it can be unit tested
//! deterministically: the poller owns the only clock, this module just
//! answers "when next".

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;

/// Standard 5-field POSIX cron (minute, hour, day-of-month, month,
/// day-of-week). The `cron` crate parses 6 or 7 field
/// expressions with a leading seconds field, so a bare 5-field expression
/// is widened to "0 <rest>" before reaching it — callers and persisted
/// `cron_expression` strings stay 5-field POSIX throughout.
fn widen_to_seconds_field(expr: &str) -> String {
    match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        _ => expr.to_string(),
    }
}

/// Parse and validate a cron expression without computing an occurrence.
/// Used by [`crate::model::Schedule::new`] to reject bad expressions eagerly.
pub fn parse(expr: &str) -> Result<CronSchedule, cron::error::Error> {
    CronSchedule::from_str(&widen_to_seconds_field(expr))
}

/// The first occurrence of `expr` strictly after `after`, or `None` if the
/// expression is invalid or has no future occurrence.
pub fn next_after(expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = CronSchedule::from_str(&widen_to_seconds_field(expr)).ok()?;
    schedule.after(&after).next()
}
