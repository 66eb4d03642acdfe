use chrono::NaiveDate;

use crate::error::WorkflowError;
use crate::models::{ApplicationStatus, ScholarshipProgram, StudentProfile};

/// Statuses that occupy one of a program's slots. The legacy rule counted
/// "approved" and "enrolled"; with the refined status set every
/// post-approval application still holds its slot until it terminates.
pub fn holds_slot(status: ApplicationStatus) -> bool {
    matches!(
        status,
        ApplicationStatus::EligibilityVerified
            | ApplicationStatus::Enrolled
            | ApplicationStatus::ServicePending
            | ApplicationStatus::ServiceCompleted
            | ApplicationStatus::DisbursementPending
            | ApplicationStatus::DisbursementProcessed
            | ApplicationStatus::Completed
    )
}

/// Slots left on a program, floor-clamped at zero for display.
pub fn remaining_slots(available_slots: i32, slot_holders: i64) -> i64 {
    (i64::from(available_slots) - slot_holders).max(0)
}

/// The single apply gate. The `programs` listing and the transactional
/// creation path both call this; any drift between the two would reopen the
/// race the recheck exists to close.
pub fn check_can_apply(
    profile: &StudentProfile,
    program: &ScholarshipProgram,
    has_existing_application: bool,
    slot_holders: i64,
    today: NaiveDate,
) -> Result<(), WorkflowError> {
    if has_existing_application {
        return Err(WorkflowError::Validation {
            message: format!("an application for '{}' already exists", program.name),
        });
    }
    if !program.active {
        return Err(WorkflowError::Validation {
            message: format!("program '{}' is not accepting applications", program.name),
        });
    }
    if program.application_deadline < today {
        return Err(WorkflowError::Validation {
            message: format!(
                "the deadline for '{}' passed on {}",
                program.name, program.application_deadline
            ),
        });
    }
    if !program.school_type_eligibility.admits(profile.school_type) {
        return Err(WorkflowError::Validation {
            message: format!(
                "'{}' accepts {} students only",
                program.name, program.school_type_eligibility
            ),
        });
    }
    if remaining_slots(program.available_slots, slot_holders) == 0 {
        return Err(WorkflowError::CapacityExceeded {
            program: program.name.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SchoolType, SchoolTypeEligibility};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn program(available_slots: i32) -> ScholarshipProgram {
        ScholarshipProgram {
            id: Uuid::new_v4(),
            name: "STEM Futures Grant".to_string(),
            total_budget: Decimal::from(500_000),
            amount_per_slot: Decimal::from(25_000),
            available_slots,
            school_type_eligibility: SchoolTypeEligibility::Both,
            min_gpa: Decimal::new(25, 1),
            min_units: 12,
            application_deadline: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            community_service_days: 6,
            active: true,
        }
    }

    fn profile(school_type: SchoolType) -> StudentProfile {
        StudentProfile {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            full_name: "Avery Lee".to_string(),
            email: "avery.lee@example.com".to_string(),
            phone: "555-0100".to_string(),
            address: "12 Harbor St".to_string(),
            school_name: "Bayview College".to_string(),
            school_type,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn remaining_slots_never_go_negative() {
        assert_eq!(remaining_slots(1, 0), 1);
        assert_eq!(remaining_slots(1, 1), 0);
        assert_eq!(remaining_slots(1, 3), 0);
    }

    #[test]
    fn single_slot_taken_by_enrolled_application_blocks_applying() {
        let program = program(1);
        let profile = profile(SchoolType::College);
        assert!(holds_slot(ApplicationStatus::Enrolled));
        let err = check_can_apply(&profile, &program, false, 1, today()).unwrap_err();
        assert!(matches!(err, WorkflowError::CapacityExceeded { .. }));
    }

    #[test]
    fn pre_approval_statuses_do_not_hold_slots() {
        for status in [
            ApplicationStatus::Draft,
            ApplicationStatus::Submitted,
            ApplicationStatus::DocumentsUnderReview,
            ApplicationStatus::Cancelled,
            ApplicationStatus::Rejected,
        ] {
            assert!(!holds_slot(status));
        }
    }

    #[test]
    fn post_approval_statuses_keep_holding_their_slot() {
        for status in [
            ApplicationStatus::EligibilityVerified,
            ApplicationStatus::ServicePending,
            ApplicationStatus::DisbursementProcessed,
            ApplicationStatus::Completed,
        ] {
            assert!(holds_slot(status));
        }
    }

    #[test]
    fn duplicate_application_is_refused() {
        let err =
            check_can_apply(&profile(SchoolType::College), &program(5), true, 0, today())
                .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn inactive_program_is_refused() {
        let mut inactive = program(5);
        inactive.active = false;
        let err =
            check_can_apply(&profile(SchoolType::College), &inactive, false, 0, today())
                .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn passed_deadline_is_refused_but_deadline_day_is_fine() {
        let mut closing = program(5);
        closing.application_deadline = today();
        assert!(
            check_can_apply(&profile(SchoolType::College), &closing, false, 0, today()).is_ok()
        );

        closing.application_deadline = today().pred_opt().unwrap();
        assert!(
            check_can_apply(&profile(SchoolType::College), &closing, false, 0, today()).is_err()
        );
    }

    #[test]
    fn school_type_must_match_unless_program_takes_both() {
        let mut hs_only = program(5);
        hs_only.school_type_eligibility = SchoolTypeEligibility::HighSchool;
        assert!(check_can_apply(
            &profile(SchoolType::HighSchool),
            &hs_only,
            false,
            0,
            today()
        )
        .is_ok());
        assert!(check_can_apply(
            &profile(SchoolType::College),
            &hs_only,
            false,
            0,
            today()
        )
        .is_err());
        assert!(
            check_can_apply(&profile(SchoolType::College), &program(5), false, 0, today())
                .is_ok()
        );
    }
}
