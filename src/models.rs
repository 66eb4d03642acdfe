use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;

/// Lifecycle status of a scholarship application. Stored as text in
/// Postgres; parsed back through `FromStr` so an unknown value fails loudly
/// instead of leaking into the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    DocumentsPending,
    DocumentsUnderReview,
    DocumentsApproved,
    DocumentsRejected,
    EligibilityVerified,
    Enrolled,
    ServicePending,
    ServiceCompleted,
    DisbursementPending,
    DisbursementProcessed,
    Completed,
    Rejected,
    Cancelled,
    Archived,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 16] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::DocumentsPending,
        ApplicationStatus::DocumentsUnderReview,
        ApplicationStatus::DocumentsApproved,
        ApplicationStatus::DocumentsRejected,
        ApplicationStatus::EligibilityVerified,
        ApplicationStatus::Enrolled,
        ApplicationStatus::ServicePending,
        ApplicationStatus::ServiceCompleted,
        ApplicationStatus::DisbursementPending,
        ApplicationStatus::DisbursementProcessed,
        ApplicationStatus::Completed,
        ApplicationStatus::Rejected,
        ApplicationStatus::Cancelled,
        ApplicationStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::DocumentsPending => "documents_pending",
            ApplicationStatus::DocumentsUnderReview => "documents_under_review",
            ApplicationStatus::DocumentsApproved => "documents_approved",
            ApplicationStatus::DocumentsRejected => "documents_rejected",
            ApplicationStatus::EligibilityVerified => "eligibility_verified",
            ApplicationStatus::Enrolled => "enrolled",
            ApplicationStatus::ServicePending => "service_pending",
            ApplicationStatus::ServiceCompleted => "service_completed",
            ApplicationStatus::DisbursementPending => "disbursement_pending",
            ApplicationStatus::DisbursementProcessed => "disbursement_processed",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
            ApplicationStatus::Archived => "archived",
        }
    }

    /// Terminal statuses accept no further student action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed
                | ApplicationStatus::Rejected
                | ApplicationStatus::Cancelled
                | ApplicationStatus::Archived
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(ApplicationStatus::Draft),
            "submitted" => Ok(ApplicationStatus::Submitted),
            "documents_pending" => Ok(ApplicationStatus::DocumentsPending),
            "documents_under_review" => Ok(ApplicationStatus::DocumentsUnderReview),
            "documents_approved" => Ok(ApplicationStatus::DocumentsApproved),
            "documents_rejected" => Ok(ApplicationStatus::DocumentsRejected),
            "eligibility_verified" => Ok(ApplicationStatus::EligibilityVerified),
            "enrolled" => Ok(ApplicationStatus::Enrolled),
            "service_pending" => Ok(ApplicationStatus::ServicePending),
            "service_completed" => Ok(ApplicationStatus::ServiceCompleted),
            "disbursement_pending" => Ok(ApplicationStatus::DisbursementPending),
            "disbursement_processed" => Ok(ApplicationStatus::DisbursementProcessed),
            "completed" => Ok(ApplicationStatus::Completed),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "cancelled" => Ok(ApplicationStatus::Cancelled),
            "archived" => Ok(ApplicationStatus::Archived),
            other => Err(WorkflowError::Validation {
                message: format!("unknown application status '{other}'"),
            }),
        }
    }
}

/// Review state shared by document uploads and community-service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    PendingReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::PendingReview => "pending_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending_review" => Ok(ReviewStatus::PendingReview),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(WorkflowError::Validation {
                message: format!("unknown review status '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    InProgress,
    Completed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::InProgress => "in_progress",
            EntryStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "in_progress" => Ok(EntryStatus::InProgress),
            "completed" => Ok(EntryStatus::Completed),
            other => Err(WorkflowError::Validation {
                message: format!("unknown entry status '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Tracked,
    PdfUpload,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Tracked => "tracked",
            ReportType::PdfUpload => "pdf_upload",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tracked" => Ok(ReportType::Tracked),
            "pdf_upload" => Ok(ReportType::PdfUpload),
            other => Err(WorkflowError::Validation {
                message: format!("unknown report type '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    Pending,
    Processed,
}

impl DisbursementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursementStatus::Pending => "pending",
            DisbursementStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisbursementStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(DisbursementStatus::Pending),
            "processed" => Ok(DisbursementStatus::Processed),
            other => Err(WorkflowError::Validation {
                message: format!("unknown disbursement status '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolType {
    HighSchool,
    College,
}

impl SchoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolType::HighSchool => "high_school",
            SchoolType::College => "college",
        }
    }
}

impl fmt::Display for SchoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchoolType {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "high_school" => Ok(SchoolType::HighSchool),
            "college" => Ok(SchoolType::College),
            other => Err(WorkflowError::Validation {
                message: format!("unknown school type '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolTypeEligibility {
    HighSchool,
    College,
    Both,
}

impl SchoolTypeEligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolTypeEligibility::HighSchool => "high_school",
            SchoolTypeEligibility::College => "college",
            SchoolTypeEligibility::Both => "both",
        }
    }

    pub fn admits(&self, school_type: SchoolType) -> bool {
        match self {
            SchoolTypeEligibility::Both => true,
            SchoolTypeEligibility::HighSchool => school_type == SchoolType::HighSchool,
            SchoolTypeEligibility::College => school_type == SchoolType::College,
        }
    }
}

impl fmt::Display for SchoolTypeEligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchoolTypeEligibility {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "high_school" => Ok(SchoolTypeEligibility::HighSchool),
            "college" => Ok(SchoolTypeEligibility::College),
            "both" => Ok(SchoolTypeEligibility::Both),
            other => Err(WorkflowError::Validation {
                message: format!("unknown school type eligibility '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScholarshipProgram {
    pub id: Uuid,
    pub name: String,
    pub total_budget: Decimal,
    pub amount_per_slot: Decimal,
    pub available_slots: i32,
    pub school_type_eligibility: SchoolTypeEligibility,
    pub min_gpa: Decimal,
    pub min_units: i32,
    pub application_deadline: NaiveDate,
    pub community_service_days: i32,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub school_name: String,
    pub school_type: SchoolType,
}

#[derive(Debug, Clone)]
pub struct ScholarshipApplication {
    pub id: Uuid,
    pub student_profile_id: Uuid,
    pub scholarship_program_id: Uuid,
    pub status: ApplicationStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DocumentRequirement {
    pub id: Uuid,
    pub scholarship_program_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_required: bool,
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub id: Uuid,
    pub application_id: Uuid,
    pub requirement_id: Uuid,
    pub file_ref: String,
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommunityServiceEntry {
    pub id: Uuid,
    pub application_id: Uuid,
    pub service_date: NaiveDate,
    pub time_in: NaiveTime,
    pub time_out: Option<NaiveTime>,
    pub task_description: String,
    pub lessons_learned: Option<String>,
    pub photos: Vec<String>,
    pub hours_completed: Option<Decimal>,
    pub status: EntryStatus,
}

#[derive(Debug, Clone)]
pub struct CommunityServiceReport {
    pub id: Uuid,
    pub application_id: Uuid,
    pub report_type: ReportType,
    pub file_ref: Option<String>,
    pub description: Option<String>,
    pub lessons_learned: Option<String>,
    pub days_completed: Decimal,
    pub total_hours: Decimal,
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Disbursement {
    pub id: Uuid,
    pub application_id: Uuid,
    pub amount: Decimal,
    pub status: DisbursementStatus,
    pub payment_method: String,
    pub reference_number: String,
    pub disbursed_at: Option<DateTime<Utc>>,
}

/// Row rendered by the `programs` subcommand: one program with its live
/// capacity and the caller's apply verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramListing {
    pub program_id: Uuid,
    pub name: String,
    pub school_type_eligibility: SchoolTypeEligibility,
    pub application_deadline: NaiveDate,
    pub community_service_days: i32,
    pub remaining_slots: i64,
    pub can_apply: bool,
    pub ineligible_reason: Option<String>,
}
