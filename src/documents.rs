use serde::Serialize;
use uuid::Uuid;

use crate::models::{ApplicationStatus, DocumentRequirement, DocumentUpload, ReviewStatus};

/// One requirement with whatever upload currently satisfies it. Recomputed
/// from the child rows on every call; nothing here is cached.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistRow {
    pub requirement_id: Uuid,
    pub name: String,
    pub is_required: bool,
    pub upload: Option<UploadSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSlot {
    pub upload_id: Uuid,
    pub file_ref: String,
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
}

/// Per-requirement view of an application's document state.
pub fn document_status(
    requirements: &[DocumentRequirement],
    uploads: &[DocumentUpload],
) -> Vec<ChecklistRow> {
    requirements
        .iter()
        .map(|requirement| {
            let upload = uploads
                .iter()
                .find(|upload| upload.requirement_id == requirement.id)
                .map(|upload| UploadSlot {
                    upload_id: upload.id,
                    file_ref: upload.file_ref.clone(),
                    status: upload.status,
                    rejection_reason: upload.rejection_reason.clone(),
                });
            ChecklistRow {
                requirement_id: requirement.id,
                name: requirement.name.clone(),
                is_required: requirement.is_required,
                upload,
            }
        })
        .collect()
}

/// True iff every requirement has an upload. Complete means submitted, not
/// approved; review outcomes are tracked per upload for the admin gate.
pub fn is_complete(requirements: &[DocumentRequirement], uploads: &[DocumentUpload]) -> bool {
    requirements.iter().all(|requirement| {
        uploads
            .iter()
            .any(|upload| upload.requirement_id == requirement.id)
    })
}

/// Submission gate: a draft application with a full document set.
pub fn can_submit(
    status: ApplicationStatus,
    requirements: &[DocumentRequirement],
    uploads: &[DocumentUpload],
) -> bool {
    status == ApplicationStatus::Draft && is_complete(requirements, uploads)
}

/// Admin-side precondition for advancing past document review: every
/// required document has an approved upload.
pub fn all_required_approved(
    requirements: &[DocumentRequirement],
    uploads: &[DocumentUpload],
) -> bool {
    requirements
        .iter()
        .filter(|requirement| requirement.is_required)
        .all(|requirement| {
            uploads.iter().any(|upload| {
                upload.requirement_id == requirement.id
                    && upload.status == ReviewStatus::Approved
            })
        })
}
