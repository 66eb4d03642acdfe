use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::WorkflowError;
use crate::models::{CommunityServiceEntry, CommunityServiceReport, EntryStatus, ReviewStatus};
use crate::timesheet::{self, ResolvedSession};

/// Photos per entry, enforced here at the ledger boundary rather than in
/// the storage layer.
pub const PHOTO_LIMIT: usize = 5;

/// Tracked reports need enough narrative to review.
pub const MIN_DESCRIPTION_CHARS: usize = 50;

/// Largest accepted PDF report.
pub const MAX_PDF_BYTES: u64 = 10 * 1024 * 1024;

/// One service day equals eight credited hours.
pub fn hours_per_day() -> Decimal {
    Decimal::from(8)
}

fn minimum_tracked_hours() -> Decimal {
    // 0.5 hours
    Decimal::new(5, 1)
}

/// Derived day/hour values for a report about to be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCredit {
    pub days_completed: Decimal,
    pub total_hours: Decimal,
}

#[derive(Debug, Clone)]
pub struct TrackedReportInput {
    pub description: String,
    pub total_hours: Decimal,
    pub service_date: NaiveDate,
    pub lessons_learned: Option<String>,
}

/// Guard for opening a live session: the date must not be in the future and
/// no other session may be in progress for the same (application, date).
pub fn validate_start_entry(
    existing: &[CommunityServiceEntry],
    service_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), WorkflowError> {
    if service_date > today {
        return Err(WorkflowError::Validation {
            message: format!("service date {service_date} is in the future"),
        });
    }
    let duplicate = existing.iter().any(|entry| {
        entry.service_date == service_date && entry.status == EntryStatus::InProgress
    });
    if duplicate {
        return Err(WorkflowError::DuplicateActiveSession { service_date });
    }
    Ok(())
}

/// Closes an in-progress entry: checks the photo cap, then hands the
/// interval to the timesheet calculator. The caller persists the returned
/// hours and time-out and marks the entry completed.
pub fn close_entry(
    entry: &CommunityServiceEntry,
    time_out: Option<NaiveTime>,
    photo_count: usize,
    now: DateTime<Utc>,
) -> Result<ResolvedSession, WorkflowError> {
    if entry.status != EntryStatus::InProgress {
        return Err(WorkflowError::Validation {
            message: "only an in-progress session can be ended".to_string(),
        });
    }
    if photo_count > PHOTO_LIMIT {
        return Err(WorkflowError::TooManyPhotos {
            supplied: photo_count,
            max: PHOTO_LIMIT,
        });
    }
    timesheet::compute_hours(entry.service_date, entry.time_in, time_out, now)
}

/// Abandoned sessions are hard-deleted; only in-progress entries qualify.
pub fn validate_cancel_entry(entry: &CommunityServiceEntry) -> Result<(), WorkflowError> {
    if entry.status != EntryStatus::InProgress {
        return Err(WorkflowError::Validation {
            message: "only an in-progress session can be cancelled".to_string(),
        });
    }
    Ok(())
}

/// Days already credited across prior reports. Rejected reports carry no
/// credit; pending ones do, so a student cannot double-book days while a
/// report awaits review.
pub fn days_completed(reports: &[CommunityServiceReport]) -> Decimal {
    reports
        .iter()
        .filter(|report| report.status != ReviewStatus::Rejected)
        .map(|report| report.days_completed)
        .sum()
}

/// Days still owed against the program requirement, floored at zero.
pub fn remaining_days(required_days: i32, reports: &[CommunityServiceReport]) -> Decimal {
    let remaining = Decimal::from(required_days) - days_completed(reports);
    remaining.max(Decimal::ZERO)
}

/// Validates a tracked (session-aggregated) report and derives its credit.
pub fn validate_tracked_report(
    input: &TrackedReportInput,
    required_days: i32,
    prior_reports: &[CommunityServiceReport],
    today: NaiveDate,
) -> Result<ReportCredit, WorkflowError> {
    if input.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(WorkflowError::Validation {
            message: format!(
                "description must be at least {MIN_DESCRIPTION_CHARS} characters"
            ),
        });
    }
    if input.total_hours < minimum_tracked_hours() {
        return Err(WorkflowError::Validation {
            message: "total hours must be at least 0.5".to_string(),
        });
    }
    if input.service_date > today {
        return Err(WorkflowError::Validation {
            message: format!("service date {} is in the future", input.service_date),
        });
    }

    let requested_days = (input.total_hours / hours_per_day())
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let remaining = remaining_days(required_days, prior_reports);
    if requested_days > remaining {
        return Err(WorkflowError::ExceedsRemainingDays {
            requested_days,
            remaining_days: remaining,
            remaining_hours: remaining * hours_per_day(),
        });
    }

    Ok(ReportCredit {
        days_completed: requested_days,
        total_hours: input.total_hours,
    })
}

/// A single PDF report is credited with the full remaining requirement.
/// Deliberate policy carried over from the paper process; change here if an
/// admin-assigned credit is ever wanted instead.
pub fn pdf_report_credit(
    required_days: i32,
    prior_reports: &[CommunityServiceReport],
) -> ReportCredit {
    let remaining = remaining_days(required_days, prior_reports);
    ReportCredit {
        days_completed: remaining,
        total_hours: remaining * hours_per_day(),
    }
}

/// Shape check for a PDF report file.
pub fn validate_pdf_file(file_name: &str, size_bytes: u64) -> Result<(), WorkflowError> {
    let is_pdf = file_name
        .rsplit('.')
        .next()
        .map(|extension| extension.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(WorkflowError::Validation {
            message: format!("'{file_name}' is not a PDF file"),
        });
    }
    if size_bytes == 0 {
        return Err(WorkflowError::Validation {
            message: "PDF report file is empty".to_string(),
        });
    }
    if size_bytes > MAX_PDF_BYTES {
        return Err(WorkflowError::Validation {
            message: format!(
                "PDF report is {size_bytes} bytes; the limit is {MAX_PDF_BYTES}"
            ),
        });
    }
    Ok(())
}

/// True once at least one report exists and every report is approved; the
/// trigger for promoting an application to service-completed.
pub fn all_reports_approved(reports: &[CommunityServiceReport]) -> bool {
    !reports.is_empty()
        && reports
            .iter()
            .all(|report| report.status == ReviewStatus::Approved)
}

/// Students may withdraw a report until an admin approves it.
pub fn validate_undo_report(report: &CommunityServiceReport) -> Result<(), WorkflowError> {
    if report.status == ReviewStatus::Approved {
        return Err(WorkflowError::CannotUndoApproved);
    }
    Ok(())
}

/// Total hours across completed entries, for the status report.
pub fn completed_entry_hours(entries: &[CommunityServiceEntry]) -> Decimal {
    entries
        .iter()
        .filter(|entry| entry.status == EntryStatus::Completed)
        .filter_map(|entry| entry.hours_completed)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportType;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(service_date: NaiveDate, status: EntryStatus) -> CommunityServiceEntry {
        CommunityServiceEntry {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            service_date,
            time_in: time(8, 0),
            time_out: None,
            task_description: "beach cleanup".to_string(),
            lessons_learned: None,
            photos: Vec::new(),
            hours_completed: None,
            status,
        }
    }

    fn report(days: Decimal, status: ReviewStatus) -> CommunityServiceReport {
        CommunityServiceReport {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            report_type: ReportType::Tracked,
            file_ref: None,
            description: Some("tracked batch".to_string()),
            lessons_learned: None,
            days_completed: days,
            total_hours: days * hours_per_day(),
            status,
            rejection_reason: None,
            submitted_at: Utc::now(),
            reviewed_at: None,
        }
    }

    fn long_description() -> String {
        "Organized and supervised the weekend coastal cleanup drive with the barangay youth council."
            .to_string()
    }

    #[test]
    fn second_active_session_on_same_date_is_rejected() {
        let existing = vec![entry(date(2026, 3, 2), EntryStatus::InProgress)];
        let err =
            validate_start_entry(&existing, date(2026, 3, 2), date(2026, 3, 2)).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateActiveSession { .. }));
    }

    #[test]
    fn completed_session_does_not_block_a_new_one() {
        let existing = vec![entry(date(2026, 3, 2), EntryStatus::Completed)];
        assert!(validate_start_entry(&existing, date(2026, 3, 2), date(2026, 3, 2)).is_ok());
    }

    #[test]
    fn future_service_date_is_rejected() {
        let err = validate_start_entry(&[], date(2026, 3, 9), date(2026, 3, 2)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn closing_with_equal_times_leaves_entry_untouched() {
        let open = entry(date(2026, 3, 2), EntryStatus::InProgress);
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let err = close_entry(&open, Some(time(8, 0)), 0, now).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInterval { .. }));
        assert_eq!(open.status, EntryStatus::InProgress);
    }

    #[test]
    fn photo_cap_is_enforced() {
        let open = entry(date(2026, 3, 2), EntryStatus::InProgress);
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let err = close_entry(&open, Some(time(12, 0)), 6, now).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::TooManyPhotos { supplied: 6, max: 5 }
        ));
        assert!(close_entry(&open, Some(time(12, 0)), 5, now).is_ok());
    }

    #[test]
    fn cancelling_a_completed_entry_fails() {
        let done = entry(date(2026, 3, 2), EntryStatus::Completed);
        assert!(validate_cancel_entry(&done).is_err());
        let open = entry(date(2026, 3, 2), EntryStatus::InProgress);
        assert!(validate_cancel_entry(&open).is_ok());
    }

    #[test]
    fn tracked_report_exceeding_remaining_days_is_rejected() {
        // Required 6 days, 4 already approved: 20 hours -> 2.5 days > 2.
        let prior = vec![report(Decimal::from(4), ReviewStatus::Approved)];
        let input = TrackedReportInput {
            description: long_description(),
            total_hours: Decimal::from(20),
            service_date: date(2026, 3, 2),
            lessons_learned: None,
        };
        let err = validate_tracked_report(&input, 6, &prior, date(2026, 3, 2)).unwrap_err();
        match err {
            WorkflowError::ExceedsRemainingDays {
                requested_days,
                remaining_days,
                remaining_hours,
            } => {
                assert_eq!(requested_days, Decimal::new(25, 1));
                assert_eq!(remaining_days, Decimal::from(2));
                assert_eq!(remaining_hours, Decimal::from(16));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn tracked_report_within_remaining_days_derives_credit() {
        let prior = vec![report(Decimal::from(4), ReviewStatus::Approved)];
        let input = TrackedReportInput {
            description: long_description(),
            total_hours: Decimal::from(12),
            service_date: date(2026, 3, 2),
            lessons_learned: None,
        };
        let credit = validate_tracked_report(&input, 6, &prior, date(2026, 3, 2)).unwrap();
        assert_eq!(credit.days_completed, Decimal::new(15, 1));
        assert_eq!(credit.total_hours, Decimal::from(12));
    }

    #[test]
    fn rejected_reports_free_their_days() {
        let prior = vec![report(Decimal::from(4), ReviewStatus::Rejected)];
        assert_eq!(remaining_days(6, &prior), Decimal::from(6));
    }

    #[test]
    fn pending_reports_still_hold_their_days() {
        let prior = vec![report(Decimal::from(4), ReviewStatus::PendingReview)];
        assert_eq!(remaining_days(6, &prior), Decimal::from(2));
    }

    #[test]
    fn short_description_is_rejected() {
        let input = TrackedReportInput {
            description: "helped out".to_string(),
            total_hours: Decimal::from(8),
            service_date: date(2026, 3, 2),
            lessons_learned: None,
        };
        let err = validate_tracked_report(&input, 6, &[], date(2026, 3, 2)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn sub_half_hour_report_is_rejected() {
        let input = TrackedReportInput {
            description: long_description(),
            total_hours: Decimal::new(25, 2),
            service_date: date(2026, 3, 2),
            lessons_learned: None,
        };
        let err = validate_tracked_report(&input, 6, &[], date(2026, 3, 2)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn future_report_date_is_rejected() {
        let input = TrackedReportInput {
            description: long_description(),
            total_hours: Decimal::from(8),
            service_date: date(2026, 3, 9),
            lessons_learned: None,
        };
        let err = validate_tracked_report(&input, 6, &[], date(2026, 3, 2)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn pdf_report_defaults_to_full_remaining_requirement() {
        let prior = vec![report(Decimal::from(4), ReviewStatus::Approved)];
        let credit = pdf_report_credit(6, &prior);
        assert_eq!(credit.days_completed, Decimal::from(2));
        assert_eq!(credit.total_hours, Decimal::from(16));
    }

    #[test]
    fn pdf_file_checks_extension_and_size() {
        assert!(validate_pdf_file("report.pdf", 1024).is_ok());
        assert!(validate_pdf_file("report.PDF", 1024).is_ok());
        assert!(validate_pdf_file("report.docx", 1024).is_err());
        assert!(validate_pdf_file("report.pdf", 0).is_err());
        assert!(validate_pdf_file("report.pdf", MAX_PDF_BYTES + 1).is_err());
    }

    #[test]
    fn approval_aggregate_requires_at_least_one_report() {
        assert!(!all_reports_approved(&[]));
        let mixed = vec![
            report(Decimal::from(2), ReviewStatus::Approved),
            report(Decimal::from(2), ReviewStatus::PendingReview),
        ];
        assert!(!all_reports_approved(&mixed));
        let approved = vec![report(Decimal::from(2), ReviewStatus::Approved)];
        assert!(all_reports_approved(&approved));
    }

    #[test]
    fn approved_reports_cannot_be_undone() {
        let approved = report(Decimal::from(2), ReviewStatus::Approved);
        assert!(matches!(
            validate_undo_report(&approved).unwrap_err(),
            WorkflowError::CannotUndoApproved
        ));
        let pending = report(Decimal::from(2), ReviewStatus::PendingReview);
        assert!(validate_undo_report(&pending).is_ok());
    }

    #[test]
    fn completed_entry_hours_ignore_open_sessions() {
        let mut done = entry(date(2026, 3, 2), EntryStatus::Completed);
        done.hours_completed = Some(Decimal::new(35, 1));
        let open = entry(date(2026, 3, 3), EntryStatus::InProgress);
        assert_eq!(
            completed_entry_hours(&[done, open]),
            Decimal::new(35, 1)
        );
    }
}
