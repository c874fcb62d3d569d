use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::warn;

use crate::types::Schedule;

/// Compute the next UTC execution time for `schedule` starting *after* `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` job whose time
/// has already passed) or when the expression itself is invalid.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => Some(from + Duration::seconds(*every_secs as i64)),

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(from.year(), from.month(), from.day(), *hour as u32, *minute as u32, 0)
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { weekday, hour, minute } => {
            let today_dow = from.weekday().num_days_from_monday() as i64;
            let target_dow = (*weekday as i64).clamp(0, 6);
            let days_ahead = target_dow - today_dow;

            let candidate_day = if days_ahead < 0 {
                from + Duration::days(7 + days_ahead)
            } else {
                from + Duration::days(days_ahead)
            };

            let candidate = Utc
                .with_ymd_and_hms(
                    candidate_day.year(),
                    candidate_day.month(),
                    candidate_day.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;

            if candidate > from {
                Some(candidate)
            } else {
                let push = if days_ahead <= 0 { 7 } else { 7 - days_ahead };
                Some(candidate + Duration::days(push))
            }
        }

        Schedule::Cron { expression } => match parse_cron(expression) {
            Ok(sched) => sched.after(&from).next(),
            Err(e) => {
                warn!(expression = %expression, error = %e, "invalid cron expression");
                None
            }
        },
    }
}

/// The `cron` crate expects a leading seconds field; the wire format here is
/// the standard 5-field minute/hour/day-of-month/month/day-of-week
/// expression, so a literal `0` seconds field is prepended before parsing.
fn parse_cron(expression: &str) -> Result<cron::Schedule, cron::error::Error> {
    let with_seconds = format!("0 {expression}");
    cron::Schedule::from_str(&with_seconds)
}

/// Validate a cron expression without computing a next-run time — used at
/// `schedule_job` time to reject malformed input immediately.
pub fn validate_cron(expression: &str) -> Result<(), String> {
    parse_cron(expression).map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn cron_every_day_at_seven_fires_next_morning() {
        let schedule = Schedule::Cron {
            expression: "0 7 * * *".to_string(),
        };
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = compute_next_run(&schedule, from).unwrap();
        assert_eq!(next.hour(), 7);
        assert_eq!(next.day(), 2);
    }

    #[test]
    fn invalid_cron_expression_yields_no_next_run() {
        let schedule = Schedule::Cron {
            expression: "not a cron".to_string(),
        };
        let from = Utc::now();
        assert!(compute_next_run(&schedule, from).is_none());
    }

    #[test]
    fn once_in_the_past_is_exhausted() {
        let schedule = Schedule::Once {
            at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        };
        assert!(compute_next_run(&schedule, Utc::now()).is_none());
    }

    #[test]
    fn interval_advances_by_fixed_seconds() {
        let schedule = Schedule::Interval { every_secs: 60 };
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = compute_next_run(&schedule, from).unwrap();
        assert_eq!(next, from + Duration::seconds(60));
    }
}
