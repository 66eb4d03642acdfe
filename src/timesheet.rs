use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::WorkflowError;

/// Outcome of closing a service session: the credited hours and the time-out
/// that was actually used (supplied, or the current wall clock for a live
/// same-day session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSession {
    pub hours: Decimal,
    pub time_out: NaiveTime,
}

/// Converts a (date, time-in, optional time-out) triple into elapsed hours,
/// rounded to two decimals.
///
/// When no time-out is supplied the session is treated as live: the current
/// wall-clock time is used, but only if `service_date` is today. Sessions
/// from past dates must be closed with an explicit time-out. Once an entry
/// is persisted as completed its stored hours are final; this function is
/// never re-run for it.
pub fn compute_hours(
    service_date: NaiveDate,
    time_in: NaiveTime,
    time_out: Option<NaiveTime>,
    now: DateTime<Utc>,
) -> Result<ResolvedSession, WorkflowError> {
    let resolved = match time_out {
        Some(value) => value,
        None => {
            if service_date != now.date_naive() {
                return Err(WorkflowError::Validation {
                    message: format!(
                        "session on {service_date} is not from today; \
                         supply an explicit time out"
                    ),
                });
            }
            now.time()
        }
    };

    if resolved <= time_in {
        return Err(WorkflowError::InvalidInterval {
            time_in,
            time_out: resolved,
        });
    }

    let minutes = resolved.signed_duration_since(time_in).num_minutes();
    let hours = (Decimal::from(minutes) / Decimal::from(60))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    // The interval check should make this unreachable; kept so a zero-minute
    // live session cannot slip through as a completed entry.
    if hours <= Decimal::ZERO {
        return Err(WorkflowError::NonPositiveDuration { hours });
    }

    Ok(ResolvedSession {
        hours,
        time_out: resolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn whole_interval_in_hours() {
        let session = compute_hours(
            date(2026, 3, 2),
            time(8, 0),
            Some(time(12, 0)),
            at(2026, 3, 5, 9, 0),
        )
        .unwrap();
        assert_eq!(session.hours, Decimal::from(4));
        assert_eq!(session.time_out, time(12, 0));
    }

    #[test]
    fn fractional_hours_round_to_two_decimals() {
        // 100 minutes -> 1.6666... -> 1.67
        let session = compute_hours(
            date(2026, 3, 2),
            time(8, 0),
            Some(time(9, 40)),
            at(2026, 3, 5, 9, 0),
        )
        .unwrap();
        assert_eq!(session.hours.to_string(), "1.67");

        // 50 minutes -> 0.8333... -> 0.83
        let session = compute_hours(
            date(2026, 3, 2),
            time(8, 0),
            Some(time(8, 50)),
            at(2026, 3, 5, 9, 0),
        )
        .unwrap();
        assert_eq!(session.hours.to_string(), "0.83");
    }

    #[test]
    fn equal_times_fail_as_invalid_interval() {
        let err = compute_hours(
            date(2026, 3, 2),
            time(8, 0),
            Some(time(8, 0)),
            at(2026, 3, 2, 9, 0),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInterval { .. }));
    }

    #[test]
    fn reversed_times_fail_as_invalid_interval() {
        let err = compute_hours(
            date(2026, 3, 2),
            time(14, 0),
            Some(time(9, 0)),
            at(2026, 3, 2, 15, 0),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInterval { .. }));
    }

    #[test]
    fn live_session_uses_current_wall_clock() {
        let session = compute_hours(
            date(2026, 3, 2),
            time(8, 0),
            None,
            at(2026, 3, 2, 10, 30),
        )
        .unwrap();
        assert_eq!(session.hours, Decimal::new(25, 1));
        assert_eq!(session.time_out, time(10, 30));
    }

    #[test]
    fn live_session_grows_when_resolved_later() {
        let earlier = compute_hours(date(2026, 3, 2), time(8, 0), None, at(2026, 3, 2, 9, 0))
            .unwrap();
        let later = compute_hours(date(2026, 3, 2), time(8, 0), None, at(2026, 3, 2, 11, 0))
            .unwrap();
        assert!(later.hours > earlier.hours);
    }

    #[test]
    fn live_session_from_past_date_is_refused() {
        let err = compute_hours(date(2026, 3, 1), time(8, 0), None, at(2026, 3, 2, 10, 0))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn zero_minute_live_session_is_not_positive() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 30).unwrap();
        let err = compute_hours(date(2026, 3, 2), time(8, 0), None, now).unwrap_err();
        assert!(matches!(err, WorkflowError::NonPositiveDuration { .. }));
    }
}
