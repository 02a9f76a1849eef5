use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{Error, Result};

/// A cron pattern evaluated in a named IANA timezone. Immutable for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    /// Classic 5-field cron: `minute hour day month weekday`.
    pub pattern: String,
    /// IANA name, e.g. `Africa/Cairo`.
    pub timezone: String,
}

/// Computes fire times for a schedule. The scheduler only ever asks "next
/// fire strictly after T", so the evaluation engine can be swapped (or faked
/// in tests) without touching the mutual-exclusion logic.
pub trait FireTimes: Send + Sync {
    fn next_fire_after(&self, spec: &ScheduleSpec, after: DateTime<Utc>) -> Result<DateTime<Utc>>;
}

/// Production engine: `cron` + `chrono-tz`. The pattern is evaluated on the
/// wall clock of the spec's timezone and the result converted back to UTC.
pub struct CronFireTimes;

impl FireTimes for CronFireTimes {
    fn next_fire_after(&self, spec: &ScheduleSpec, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let schedule = parse_pattern(&spec.pattern)?;
        let tz: Tz = spec
            .timezone
            .parse()
            .map_err(|_| Error::Schedule(format!("unknown timezone '{}'", spec.timezone)))?;

        let local_after = after.with_timezone(&tz);
        let next = schedule.after(&local_after).next().ok_or_else(|| {
            Error::Schedule(format!("pattern '{}' has no future occurrence", spec.pattern))
        })?;
        Ok(next.with_timezone(&Utc))
    }
}

/// The configuration surface is 5-field cron; the `cron` crate wants a
/// leading seconds field, so `0` is prepended.
fn parse_pattern(pattern: &str) -> Result<Schedule> {
    let trimmed = pattern.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|e| Error::Schedule(format!("invalid cron pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn daily_nine_cairo() -> ScheduleSpec {
        ScheduleSpec {
            pattern: "0 9 * * *".to_string(),
            timezone: "Africa/Cairo".to_string(),
        }
    }

    // Cairo is UTC+2 in January, so 09:00 local is 07:00 UTC.

    #[test]
    fn one_second_before_nine_fires_at_nine_same_day() {
        let after = Utc.with_ymd_and_hms(2026, 1, 15, 6, 59, 59).unwrap();
        let next = CronFireTimes
            .next_fire_after(&daily_nine_cairo(), after)
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 15, 7, 0, 0).unwrap());
    }

    #[test]
    fn exactly_nine_fires_next_day() {
        let after = Utc.with_ymd_and_hms(2026, 1, 15, 7, 0, 0).unwrap();
        let next = CronFireTimes
            .next_fire_after(&daily_nine_cairo(), after)
            .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 16, 7, 0, 0).unwrap());
    }

    #[test]
    fn every_five_minutes_pattern() {
        let spec = ScheduleSpec {
            pattern: "*/5 * * * *".to_string(),
            timezone: "UTC".to_string(),
        };
        let after = Utc.with_ymd_and_hms(2026, 1, 15, 10, 2, 0).unwrap();
        let next = CronFireTimes.next_fire_after(&spec, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 15, 10, 5, 0).unwrap());
    }

    #[test]
    fn invalid_pattern_is_a_schedule_error() {
        let spec = ScheduleSpec {
            pattern: "not a cron".to_string(),
            timezone: "UTC".to_string(),
        };
        let err = CronFireTimes
            .next_fire_after(&spec, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::Schedule(_)));
    }

    #[test]
    fn unknown_timezone_is_a_schedule_error() {
        let spec = ScheduleSpec {
            pattern: "0 9 * * *".to_string(),
            timezone: "Mars/Olympus_Mons".to_string(),
        };
        let err = CronFireTimes
            .next_fire_after(&spec, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::Schedule(_)));
    }
}
