use std::fmt::Write;

use rust_decimal::Decimal;

use crate::documents::ChecklistRow;
use crate::models::{
    CommunityServiceEntry, CommunityServiceReport, Disbursement, ScholarshipApplication,
    ScholarshipProgram, StudentProfile,
};
use crate::service;

/// Renders one application as a markdown summary: document checklist,
/// service-day progress, report review states, and disbursements.
pub fn build_status_report(
    program: &ScholarshipProgram,
    profile: &StudentProfile,
    application: &ScholarshipApplication,
    checklist: &[ChecklistRow],
    entries: &[CommunityServiceEntry],
    reports: &[CommunityServiceReport],
    disbursements: &[Disbursement],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Application Status: {}", program.name);
    let _ = writeln!(
        output,
        "Student: {} ({}) | Status: {}",
        profile.full_name, profile.email, application.status
    );
    if let Some(submitted_at) = application.submitted_at {
        let _ = writeln!(output, "Submitted: {}", submitted_at.date_naive());
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Documents");
    if checklist.is_empty() {
        let _ = writeln!(output, "This program has no document requirements.");
    } else {
        for row in checklist {
            let requirement_kind = if row.is_required { "required" } else { "optional" };
            match &row.upload {
                Some(slot) => {
                    let _ = writeln!(
                        output,
                        "- {} ({requirement_kind}): {}{}",
                        row.name,
                        slot.status,
                        slot.rejection_reason
                            .as_deref()
                            .map(|reason| format!(" ({reason})"))
                            .unwrap_or_default()
                    );
                }
                None => {
                    let _ = writeln!(output, "- {} ({requirement_kind}): missing", row.name);
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Community Service");
    let completed_days = service::days_completed(reports);
    let remaining = service::remaining_days(program.community_service_days, reports);
    let _ = writeln!(
        output,
        "{completed_days} of {} days credited ({remaining} remaining, {} hours logged \
         across {} completed sessions)",
        program.community_service_days,
        service::completed_entry_hours(entries),
        entries
            .iter()
            .filter(|entry| entry.status == crate::models::EntryStatus::Completed)
            .count()
    );

    if reports.is_empty() {
        let _ = writeln!(output, "No reports submitted yet.");
    } else {
        for report in reports {
            let _ = writeln!(
                output,
                "- {} report on {}: {} days, {} hours, {}{}",
                report.report_type,
                report.submitted_at.date_naive(),
                report.days_completed,
                report.total_hours,
                report.status,
                report
                    .rejection_reason
                    .as_deref()
                    .map(|reason| format!(" ({reason})"))
                    .unwrap_or_default()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Disbursement");
    if disbursements.is_empty() {
        let _ = writeln!(output, "No disbursement recorded.");
    } else {
        let total: Decimal = disbursements
            .iter()
            .map(|disbursement| disbursement.amount)
            .sum();
        for disbursement in disbursements {
            let _ = writeln!(
                output,
                "- {} via {} (ref {}): {}",
                disbursement.amount,
                disbursement.payment_method,
                disbursement.reference_number,
                disbursement.status
            );
        }
        let _ = writeln!(output, "Total: {total}");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use crate::models::{
        ApplicationStatus, DocumentRequirement, EntryStatus, ReportType, ReviewStatus,
        SchoolType, SchoolTypeEligibility,
    };
    use chrono::{NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    fn fixture() -> (
        ScholarshipProgram,
        StudentProfile,
        ScholarshipApplication,
        Vec<DocumentRequirement>,
    ) {
        let program = ScholarshipProgram {
            id: Uuid::new_v4(),
            name: "STEM Futures Grant".to_string(),
            total_budget: Decimal::from(500_000),
            amount_per_slot: Decimal::from(25_000),
            available_slots: 5,
            school_type_eligibility: SchoolTypeEligibility::Both,
            min_gpa: Decimal::new(25, 1),
            min_units: 12,
            application_deadline: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            community_service_days: 6,
            active: true,
        };
        let profile = StudentProfile {
            id: Uuid::new_v4(),
            user_id: None,
            full_name: "Avery Lee".to_string(),
            email: "avery.lee@example.com".to_string(),
            phone: "555-0100".to_string(),
            address: "12 Harbor St".to_string(),
            school_name: "Bayview College".to_string(),
            school_type: SchoolType::College,
        };
        let application = ScholarshipApplication {
            id: Uuid::new_v4(),
            student_profile_id: profile.id,
            scholarship_program_id: program.id,
            status: ApplicationStatus::ServicePending,
            submitted_at: Some(Utc::now()),
            reviewed_at: None,
            created_at: Utc::now(),
        };
        let requirements = vec![DocumentRequirement {
            id: Uuid::new_v4(),
            scholarship_program_id: program.id,
            name: "transcript".to_string(),
            description: "Transcript of records".to_string(),
            is_required: true,
        }];
        (program, profile, application, requirements)
    }

    #[test]
    fn report_lists_missing_documents_and_service_progress() {
        let (program, profile, application, requirements) = fixture();
        let checklist = documents::document_status(&requirements, &[]);
        let reports = vec![CommunityServiceReport {
            id: Uuid::new_v4(),
            application_id: application.id,
            report_type: ReportType::Tracked,
            file_ref: None,
            description: Some("weekend cleanup".to_string()),
            lessons_learned: None,
            days_completed: Decimal::from(2),
            total_hours: Decimal::from(16),
            status: ReviewStatus::PendingReview,
            rejection_reason: None,
            submitted_at: Utc::now(),
            reviewed_at: None,
        }];
        let entries = vec![CommunityServiceEntry {
            id: Uuid::new_v4(),
            application_id: application.id,
            service_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            time_in: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            time_out: NaiveTime::from_hms_opt(12, 0, 0),
            task_description: "beach cleanup".to_string(),
            lessons_learned: None,
            photos: Vec::new(),
            hours_completed: Some(Decimal::from(4)),
            status: EntryStatus::Completed,
        }];

        let rendered = build_status_report(
            &program,
            &profile,
            &application,
            &checklist,
            &entries,
            &reports,
            &[],
        );
        assert!(rendered.contains("transcript (required): missing"));
        assert!(rendered.contains("2 of 6 days credited"));
        assert!(rendered.contains("tracked report"));
        assert!(rendered.contains("No disbursement recorded."));
    }
}
