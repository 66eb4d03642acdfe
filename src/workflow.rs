use std::fmt;

use crate::documents;
use crate::error::WorkflowError;
use crate::models::{
    ApplicationStatus, CommunityServiceReport, Disbursement, DisbursementStatus,
    DocumentRequirement, DocumentUpload, ScholarshipApplication, StudentProfile,
};
use crate::service;

/// Every action that can move an application between statuses. Student
/// actions are guarded by ownership; the review actions are invoked by the
/// admin surface but validated here all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Cancel,
    RequestDocuments,
    BeginDocumentReview,
    ApproveDocuments,
    RejectDocuments,
    VerifyEligibility,
    Enroll,
    SubmitServiceReport,
    CompleteService,
    UndoServiceCompletion,
    BeginDisbursement,
    ProcessDisbursement,
    Complete,
    Reject,
    Archive,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::Cancel => "cancel",
            Action::RequestDocuments => "request documents",
            Action::BeginDocumentReview => "begin document review",
            Action::ApproveDocuments => "approve documents",
            Action::RejectDocuments => "reject documents",
            Action::VerifyEligibility => "verify eligibility",
            Action::Enroll => "enroll",
            Action::SubmitServiceReport => "submit a service report for",
            Action::CompleteService => "complete service for",
            Action::UndoServiceCompletion => "undo service completion for",
            Action::BeginDisbursement => "begin disbursement for",
            Action::ProcessDisbursement => "process disbursement for",
            Action::Complete => "complete",
            Action::Reject => "reject",
            Action::Archive => "archive",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. Anything not listed is an `InvalidTransition`;
/// callers persist the returned status only after their own precondition
/// checks pass, so a rejected attempt mutates nothing.
pub fn transition(
    current: ApplicationStatus,
    action: Action,
) -> Result<ApplicationStatus, WorkflowError> {
    use crate::models::ApplicationStatus::*;

    let next = match (current, action) {
        (Draft, Action::Submit) => Submitted,

        (Draft, Action::Cancel)
        | (Submitted, Action::Cancel)
        | (DocumentsPending, Action::Cancel)
        | (DocumentsUnderReview, Action::Cancel) => Cancelled,

        (Submitted, Action::RequestDocuments) => DocumentsPending,
        (Submitted, Action::BeginDocumentReview)
        | (DocumentsPending, Action::BeginDocumentReview)
        | (DocumentsRejected, Action::BeginDocumentReview) => DocumentsUnderReview,

        (DocumentsUnderReview, Action::ApproveDocuments) => DocumentsApproved,
        (DocumentsUnderReview, Action::RejectDocuments) => DocumentsRejected,

        (DocumentsApproved, Action::VerifyEligibility) => EligibilityVerified,
        (EligibilityVerified, Action::Enroll) => Enrolled,

        (Enrolled, Action::SubmitServiceReport) => ServicePending,
        (ServicePending, Action::SubmitServiceReport) => ServicePending,

        (ServicePending, Action::CompleteService) => ServiceCompleted,
        (ServiceCompleted, Action::UndoServiceCompletion) => ServicePending,

        (ServiceCompleted, Action::BeginDisbursement) => DisbursementPending,
        (DisbursementPending, Action::ProcessDisbursement) => DisbursementProcessed,
        (DisbursementProcessed, Action::Complete) => Completed,

        (Submitted, Action::Reject)
        | (DocumentsUnderReview, Action::Reject)
        | (DocumentsRejected, Action::Reject)
        | (EligibilityVerified, Action::Reject) => Rejected,

        (Completed, Action::Archive)
        | (Rejected, Action::Archive)
        | (Cancelled, Action::Archive) => Archived,

        _ => {
            return Err(WorkflowError::InvalidTransition { current, action });
        }
    };

    Ok(next)
}

/// Ownership check applied before every student mutation.
pub fn ensure_owner(
    profile: &StudentProfile,
    application: &ScholarshipApplication,
) -> Result<(), WorkflowError> {
    if profile.id != application.student_profile_id {
        return Err(WorkflowError::Forbidden);
    }
    Ok(())
}

/// Precondition for `ApproveDocuments`: every required document approved.
pub fn can_approve_documents(
    requirements: &[DocumentRequirement],
    uploads: &[DocumentUpload],
) -> bool {
    documents::all_required_approved(requirements, uploads)
}

/// Precondition for `CompleteService`: at least one report, all approved.
pub fn can_complete_service(reports: &[CommunityServiceReport]) -> bool {
    service::all_reports_approved(reports)
}

/// Precondition for `ProcessDisbursement`: a processed disbursement row
/// exists for the application.
pub fn can_process_disbursement(disbursements: &[Disbursement]) -> bool {
    disbursements
        .iter()
        .any(|disbursement| disbursement.status == DisbursementStatus::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus::*;

    #[test]
    fn draft_submits_to_submitted() {
        assert_eq!(transition(Draft, Action::Submit).unwrap(), Submitted);
    }

    #[test]
    fn submit_is_not_idempotent() {
        let err = transition(Submitted, Action::Submit).unwrap_err();
        match err {
            WorkflowError::InvalidTransition { current, action } => {
                assert_eq!(current, Submitted);
                assert_eq!(action, Action::Submit);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cancel_is_limited_to_pre_approval_statuses() {
        for status in [Draft, Submitted, DocumentsPending, DocumentsUnderReview] {
            assert_eq!(transition(status, Action::Cancel).unwrap(), Cancelled);
        }
        for status in [Enrolled, ServicePending, Completed, Cancelled] {
            assert!(transition(status, Action::Cancel).is_err());
        }
    }

    #[test]
    fn cancelled_is_terminal_for_student_actions() {
        assert!(transition(Cancelled, Action::Submit).is_err());
        assert!(transition(Cancelled, Action::SubmitServiceReport).is_err());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn happy_path_reaches_completed() {
        let steps = [
            (Draft, Action::Submit),
            (Submitted, Action::BeginDocumentReview),
            (DocumentsUnderReview, Action::ApproveDocuments),
            (DocumentsApproved, Action::VerifyEligibility),
            (EligibilityVerified, Action::Enroll),
            (Enrolled, Action::SubmitServiceReport),
            (ServicePending, Action::CompleteService),
            (ServiceCompleted, Action::BeginDisbursement),
            (DisbursementPending, Action::ProcessDisbursement),
            (DisbursementProcessed, Action::Complete),
        ];
        let mut status = Draft;
        for (expected_current, action) in steps {
            assert_eq!(status, expected_current);
            status = transition(status, action).unwrap();
        }
        assert_eq!(status, Completed);
    }

    #[test]
    fn report_submission_from_enrolled_moves_to_service_pending() {
        assert_eq!(
            transition(Enrolled, Action::SubmitServiceReport).unwrap(),
            ServicePending
        );
        // Further reports while already pending keep the status put.
        assert_eq!(
            transition(ServicePending, Action::SubmitServiceReport).unwrap(),
            ServicePending
        );
    }

    #[test]
    fn undo_service_completion_only_from_service_completed() {
        assert_eq!(
            transition(ServiceCompleted, Action::UndoServiceCompletion).unwrap(),
            ServicePending
        );
        assert!(transition(ServicePending, Action::UndoServiceCompletion).is_err());
        assert!(transition(Enrolled, Action::UndoServiceCompletion).is_err());
    }

    #[test]
    fn rejected_documents_can_reenter_review() {
        assert_eq!(
            transition(DocumentsRejected, Action::BeginDocumentReview).unwrap(),
            DocumentsUnderReview
        );
    }
}
