use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::documents;
use crate::eligibility;
use crate::error::WorkflowError;
use crate::models::{
    ApplicationStatus, CommunityServiceEntry, CommunityServiceReport, Disbursement,
    DisbursementStatus, DocumentRequirement, DocumentUpload, EntryStatus, ProgramListing,
    ReportType, ReviewStatus, ScholarshipApplication, ScholarshipProgram, StudentProfile,
};
use crate::service::{self, TrackedReportInput};
use crate::store::{self, FileStore};
use crate::workflow::{self, Action};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn slot_holding_statuses() -> Vec<String> {
    ApplicationStatus::ALL
        .iter()
        .filter(|status| eligibility::holds_slot(**status))
        .map(|status| status.as_str().to_string())
        .collect()
}

fn map_program(row: &PgRow) -> anyhow::Result<ScholarshipProgram> {
    let eligibility_raw: String = row.get("school_type_eligibility");
    Ok(ScholarshipProgram {
        id: row.get("id"),
        name: row.get("name"),
        total_budget: row.get("total_budget"),
        amount_per_slot: row.get("amount_per_slot"),
        available_slots: row.get("available_slots"),
        school_type_eligibility: eligibility_raw.parse()?,
        min_gpa: row.get("min_gpa"),
        min_units: row.get("min_units"),
        application_deadline: row.get("application_deadline"),
        community_service_days: row.get("community_service_days"),
        active: row.get("active"),
    })
}

fn map_profile(row: &PgRow) -> anyhow::Result<StudentProfile> {
    let school_type_raw: String = row.get("school_type");
    Ok(StudentProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        school_name: row.get("school_name"),
        school_type: school_type_raw.parse()?,
    })
}

fn map_application(row: &PgRow) -> anyhow::Result<ScholarshipApplication> {
    let status_raw: String = row.get("status");
    Ok(ScholarshipApplication {
        id: row.get("id"),
        student_profile_id: row.get("student_profile_id"),
        scholarship_program_id: row.get("scholarship_program_id"),
        status: status_raw.parse()?,
        submitted_at: row.get("submitted_at"),
        reviewed_at: row.get("reviewed_at"),
        created_at: row.get("created_at"),
    })
}

fn map_requirement(row: &PgRow) -> DocumentRequirement {
    DocumentRequirement {
        id: row.get("id"),
        scholarship_program_id: row.get("scholarship_program_id"),
        name: row.get("name"),
        description: row.get("description"),
        is_required: row.get("is_required"),
    }
}

fn map_upload(row: &PgRow) -> anyhow::Result<DocumentUpload> {
    let status_raw: String = row.get("status");
    Ok(DocumentUpload {
        id: row.get("id"),
        application_id: row.get("application_id"),
        requirement_id: row.get("requirement_id"),
        file_ref: row.get("file_ref"),
        status: status_raw.parse()?,
        rejection_reason: row.get("rejection_reason"),
        uploaded_at: row.get("uploaded_at"),
    })
}

fn map_entry(row: &PgRow) -> anyhow::Result<CommunityServiceEntry> {
    let status_raw: String = row.get("status");
    Ok(CommunityServiceEntry {
        id: row.get("id"),
        application_id: row.get("application_id"),
        service_date: row.get("service_date"),
        time_in: row.get("time_in"),
        time_out: row.get("time_out"),
        task_description: row.get("task_description"),
        lessons_learned: row.get("lessons_learned"),
        photos: row.get("photos"),
        hours_completed: row.get("hours_completed"),
        status: status_raw.parse()?,
    })
}

fn map_report(row: &PgRow) -> anyhow::Result<CommunityServiceReport> {
    let type_raw: String = row.get("report_type");
    let status_raw: String = row.get("status");
    Ok(CommunityServiceReport {
        id: row.get("id"),
        application_id: row.get("application_id"),
        report_type: type_raw.parse()?,
        file_ref: row.get("file_ref"),
        description: row.get("description"),
        lessons_learned: row.get("lessons_learned"),
        days_completed: row.get("days_completed"),
        total_hours: row.get("total_hours"),
        status: status_raw.parse()?,
        rejection_reason: row.get("rejection_reason"),
        submitted_at: row.get("submitted_at"),
        reviewed_at: row.get("reviewed_at"),
    })
}

fn map_disbursement(row: &PgRow) -> anyhow::Result<Disbursement> {
    let status_raw: String = row.get("status");
    Ok(Disbursement {
        id: row.get("id"),
        application_id: row.get("application_id"),
        amount: row.get("amount"),
        status: status_raw.parse()?,
        payment_method: row.get("payment_method"),
        reference_number: row.get("reference_number"),
        disbursed_at: row.get("disbursed_at"),
    })
}

pub async fn profile_by_email(pool: &PgPool, email: &str) -> anyhow::Result<StudentProfile> {
    let row = sqlx::query(
        "SELECT id, user_id, full_name, email, phone, address, school_name, school_type \
         FROM scholarship_workflow.student_profiles WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student profile for {email}"))?;
    map_profile(&row)
}

pub async fn profile_by_id(pool: &PgPool, id: Uuid) -> anyhow::Result<StudentProfile> {
    let row = sqlx::query(
        "SELECT id, user_id, full_name, email, phone, address, school_name, school_type \
         FROM scholarship_workflow.student_profiles WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    map_profile(&row)
}

pub async fn program_by_id(pool: &PgPool, id: Uuid) -> anyhow::Result<ScholarshipProgram> {
    let row = sqlx::query(
        "SELECT id, name, total_budget, amount_per_slot, available_slots, \
         school_type_eligibility, min_gpa, min_units, application_deadline, \
         community_service_days, active \
         FROM scholarship_workflow.scholarship_programs WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    map_program(&row)
}

pub async fn application_by_id(
    pool: &PgPool,
    id: Uuid,
) -> anyhow::Result<ScholarshipApplication> {
    let row = sqlx::query(
        "SELECT id, student_profile_id, scholarship_program_id, status, \
         submitted_at, reviewed_at, created_at \
         FROM scholarship_workflow.scholarship_applications WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no application {id}"))?;
    map_application(&row)
}

pub async fn requirements_for_program(
    pool: &PgPool,
    program_id: Uuid,
) -> anyhow::Result<Vec<DocumentRequirement>> {
    let rows = sqlx::query(
        "SELECT id, scholarship_program_id, name, description, is_required \
         FROM scholarship_workflow.document_requirements \
         WHERE scholarship_program_id = $1 ORDER BY name",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_requirement).collect())
}

pub async fn uploads_for_application(
    pool: &PgPool,
    application_id: Uuid,
) -> anyhow::Result<Vec<DocumentUpload>> {
    let rows = sqlx::query(
        "SELECT id, application_id, requirement_id, file_ref, status, \
         rejection_reason, uploaded_at \
         FROM scholarship_workflow.document_uploads WHERE application_id = $1",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_upload).collect()
}

pub async fn entries_for_application(
    pool: &PgPool,
    application_id: Uuid,
) -> anyhow::Result<Vec<CommunityServiceEntry>> {
    let rows = sqlx::query(
        "SELECT id, application_id, service_date, time_in, time_out, task_description, \
         lessons_learned, photos, hours_completed, status \
         FROM scholarship_workflow.community_service_entries \
         WHERE application_id = $1 ORDER BY service_date, time_in",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_entry).collect()
}

pub async fn entry_by_id(pool: &PgPool, id: Uuid) -> anyhow::Result<CommunityServiceEntry> {
    let row = sqlx::query(
        "SELECT id, application_id, service_date, time_in, time_out, task_description, \
         lessons_learned, photos, hours_completed, status \
         FROM scholarship_workflow.community_service_entries WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no service entry {id}"))?;
    map_entry(&row)
}

pub async fn reports_for_application(
    pool: &PgPool,
    application_id: Uuid,
) -> anyhow::Result<Vec<CommunityServiceReport>> {
    let rows = sqlx::query(
        "SELECT id, application_id, report_type, file_ref, description, lessons_learned, \
         days_completed, total_hours, status, rejection_reason, submitted_at, reviewed_at \
         FROM scholarship_workflow.community_service_reports \
         WHERE application_id = $1 ORDER BY submitted_at",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_report).collect()
}

pub async fn report_by_id(pool: &PgPool, id: Uuid) -> anyhow::Result<CommunityServiceReport> {
    let row = sqlx::query(
        "SELECT id, application_id, report_type, file_ref, description, lessons_learned, \
         days_completed, total_hours, status, rejection_reason, submitted_at, reviewed_at \
         FROM scholarship_workflow.community_service_reports WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no service report {id}"))?;
    map_report(&row)
}

pub async fn disbursements_for_application(
    pool: &PgPool,
    application_id: Uuid,
) -> anyhow::Result<Vec<Disbursement>> {
    let rows = sqlx::query(
        "SELECT id, application_id, amount, status, payment_method, reference_number, \
         disbursed_at \
         FROM scholarship_workflow.disbursements WHERE application_id = $1",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_disbursement).collect()
}

async fn count_slot_holders<'e, E>(executor: E, program_id: Uuid) -> anyhow::Result<i64>
where
    E: sqlx::PgExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scholarship_workflow.scholarship_applications \
         WHERE scholarship_program_id = $1 AND status = ANY($2)",
    )
    .bind(program_id)
    .bind(slot_holding_statuses())
    .fetch_one(executor)
    .await?;
    Ok(count)
}

async fn has_application<'e, E>(
    executor: E,
    student_profile_id: Uuid,
    program_id: Uuid,
) -> anyhow::Result<bool>
where
    E: sqlx::PgExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scholarship_workflow.scholarship_applications \
         WHERE student_profile_id = $1 AND scholarship_program_id = $2",
    )
    .bind(student_profile_id)
    .bind(program_id)
    .fetch_one(executor)
    .await?;
    Ok(count > 0)
}

/// Program listing for a student: remaining slots plus the apply verdict,
/// computed with the same predicate the creation path re-checks.
pub async fn list_programs(
    pool: &PgPool,
    profile: &StudentProfile,
    today: NaiveDate,
) -> anyhow::Result<Vec<ProgramListing>> {
    let rows = sqlx::query(
        "SELECT id, name, total_budget, amount_per_slot, available_slots, \
         school_type_eligibility, min_gpa, min_units, application_deadline, \
         community_service_days, active \
         FROM scholarship_workflow.scholarship_programs ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut listings = Vec::new();
    for row in rows {
        let program = map_program(&row)?;
        let slot_holders = count_slot_holders(pool, program.id).await?;
        let existing = has_application(pool, profile.id, program.id).await?;
        let verdict =
            eligibility::check_can_apply(profile, &program, existing, slot_holders, today);
        listings.push(ProgramListing {
            program_id: program.id,
            name: program.name,
            school_type_eligibility: program.school_type_eligibility,
            application_deadline: program.application_deadline,
            community_service_days: program.community_service_days,
            remaining_slots: eligibility::remaining_slots(
                program.available_slots,
                slot_holders,
            ),
            can_apply: verdict.is_ok(),
            ineligible_reason: verdict.err().map(|err| err.to_string()),
        });
    }
    Ok(listings)
}

/// Creates a draft application. The program row is locked and the slot
/// count and duplicate check re-run inside the transaction, so two students
/// racing for the last slot cannot both get in.
pub async fn create_application(
    pool: &PgPool,
    profile: &StudentProfile,
    program_name: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<ScholarshipApplication> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "SELECT id, name, total_budget, amount_per_slot, available_slots, \
         school_type_eligibility, min_gpa, min_units, application_deadline, \
         community_service_days, active \
         FROM scholarship_workflow.scholarship_programs WHERE name = $1 FOR UPDATE",
    )
    .bind(program_name)
    .fetch_optional(&mut *tx)
    .await?
    .with_context(|| format!("no scholarship program named '{program_name}'"))?;
    let program = map_program(&row)?;

    let existing = has_application(&mut *tx, profile.id, program.id).await?;
    let slot_holders = count_slot_holders(&mut *tx, program.id).await?;
    eligibility::check_can_apply(
        profile,
        &program,
        existing,
        slot_holders,
        now.date_naive(),
    )?;

    let application = ScholarshipApplication {
        id: Uuid::new_v4(),
        student_profile_id: profile.id,
        scholarship_program_id: program.id,
        status: ApplicationStatus::Draft,
        submitted_at: None,
        reviewed_at: None,
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO scholarship_workflow.scholarship_applications \
         (id, student_profile_id, scholarship_program_id, status, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(application.id)
    .bind(application.student_profile_id)
    .bind(application.scholarship_program_id)
    .bind(application.status.as_str())
    .bind(application.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        application = %application.id,
        program = %program.name,
        student = %profile.email,
        "draft application created"
    );
    Ok(application)
}

async fn persist_status(
    pool: &PgPool,
    application: &ScholarshipApplication,
    next: ApplicationStatus,
    submitted_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let updated = sqlx::query(
        "UPDATE scholarship_workflow.scholarship_applications \
         SET status = $1, \
             submitted_at = COALESCE($2, submitted_at), \
             reviewed_at = COALESCE($3, reviewed_at) \
         WHERE id = $4 AND status = $5",
    )
    .bind(next.as_str())
    .bind(submitted_at)
    .bind(reviewed_at)
    .bind(application.id)
    .bind(application.status.as_str())
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        anyhow::bail!("application {} changed concurrently; retry", application.id);
    }
    tracing::info!(
        application = %application.id,
        from = %application.status,
        to = %next,
        "application status changed"
    );
    Ok(())
}

/// Submit: draft with a full document set. `submitted_at` is stamped once;
/// a second submit fails the transition check before any write.
pub async fn submit_application(
    pool: &PgPool,
    profile: &StudentProfile,
    application_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<ApplicationStatus> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    let next = workflow::transition(application.status, Action::Submit)?;

    let requirements =
        requirements_for_program(pool, application.scholarship_program_id).await?;
    let uploads = uploads_for_application(pool, application.id).await?;
    if !documents::is_complete(&requirements, &uploads) {
        return Err(WorkflowError::Validation {
            message: "one or more document requirements have no upload".to_string(),
        }
        .into());
    }

    persist_status(pool, &application, next, Some(now), None).await?;
    Ok(next)
}

pub async fn cancel_application(
    pool: &PgPool,
    profile: &StudentProfile,
    application_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<ApplicationStatus> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    let next = workflow::transition(application.status, Action::Cancel)?;
    persist_status(pool, &application, next, None, Some(now)).await?;
    Ok(next)
}

fn document_upload_allowed(status: ApplicationStatus) -> Result<(), WorkflowError> {
    match status {
        ApplicationStatus::Draft
        | ApplicationStatus::DocumentsPending
        | ApplicationStatus::DocumentsRejected => Ok(()),
        other => Err(WorkflowError::Validation {
            message: format!("documents cannot be uploaded while status is '{other}'"),
        }),
    }
}

/// Stores (or replaces) the upload for one requirement. Replacement deletes
/// the old file first; if that fails the previous upload row stays intact.
/// A failure after the new file is written removes it again so no orphan
/// refs are left behind.
pub async fn upload_document(
    pool: &PgPool,
    file_store: &dyn FileStore,
    profile: &StudentProfile,
    application_id: Uuid,
    requirement_name: &str,
    source: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<DocumentUpload> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    document_upload_allowed(application.status)?;

    let requirements =
        requirements_for_program(pool, application.scholarship_program_id).await?;
    let requirement = requirements
        .iter()
        .find(|requirement| requirement.name == requirement_name)
        .with_context(|| {
            format!("the program has no document requirement named '{requirement_name}'")
        })?;

    let uploads = uploads_for_application(pool, application.id).await?;
    let previous = uploads
        .iter()
        .find(|upload| upload.requirement_id == requirement.id);
    if let Some(previous) = previous {
        if previous.status == ReviewStatus::Approved {
            return Err(WorkflowError::Validation {
                message: format!("'{requirement_name}' is already approved"),
            }
            .into());
        }
        // Old file goes first; if this fails the existing row is untouched.
        file_store.delete(&previous.file_ref)?;
    }

    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .context("upload path has no file name")?;
    let bytes = store::read_upload(source)?;
    let upload = DocumentUpload {
        id: Uuid::new_v4(),
        application_id: application.id,
        requirement_id: requirement.id,
        file_ref: format!("documents/{}/{}/{}", application.id, Uuid::new_v4(), file_name),
        status: ReviewStatus::PendingReview,
        rejection_reason: None,
        uploaded_at: now,
    };
    file_store.store(&bytes, &upload.file_ref)?;

    let mut tx = pool.begin().await?;
    let insert = async {
        if let Some(previous) = previous {
            sqlx::query("DELETE FROM scholarship_workflow.document_uploads WHERE id = $1")
                .bind(previous.id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "INSERT INTO scholarship_workflow.document_uploads \
             (id, application_id, requirement_id, file_ref, status, uploaded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(upload.id)
        .bind(upload.application_id)
        .bind(upload.requirement_id)
        .bind(&upload.file_ref)
        .bind(upload.status.as_str())
        .bind(upload.uploaded_at)
        .execute(&mut *tx)
        .await?;
        Ok::<_, sqlx::Error>(())
    }
    .await;

    if let Err(err) = insert {
        tx.rollback().await.ok();
        // Best effort: don't leave the new file orphaned.
        let _ = file_store.delete(&upload.file_ref);
        return Err(err.into());
    }
    tx.commit().await?;

    tracing::info!(
        application = %application.id,
        requirement = requirement_name,
        replaced = previous.is_some(),
        "document uploaded"
    );
    Ok(upload)
}

fn service_logging_allowed(status: ApplicationStatus) -> Result<(), WorkflowError> {
    match status {
        ApplicationStatus::Enrolled | ApplicationStatus::ServicePending => Ok(()),
        other => Err(WorkflowError::Validation {
            message: format!("community service cannot be logged while status is '{other}'"),
        }),
    }
}

pub async fn start_service_entry(
    pool: &PgPool,
    profile: &StudentProfile,
    application_id: Uuid,
    service_date: NaiveDate,
    time_in: NaiveTime,
    task_description: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<CommunityServiceEntry> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    service_logging_allowed(application.status)?;
    if task_description.trim().is_empty() {
        return Err(WorkflowError::Validation {
            message: "task description is required".to_string(),
        }
        .into());
    }

    let existing = entries_for_application(pool, application.id).await?;
    service::validate_start_entry(&existing, service_date, now.date_naive())?;

    let entry = CommunityServiceEntry {
        id: Uuid::new_v4(),
        application_id: application.id,
        service_date,
        time_in,
        time_out: None,
        task_description: task_description.to_string(),
        lessons_learned: None,
        photos: Vec::new(),
        hours_completed: None,
        status: EntryStatus::InProgress,
    };
    sqlx::query(
        "INSERT INTO scholarship_workflow.community_service_entries \
         (id, application_id, service_date, time_in, task_description, photos, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id)
    .bind(entry.application_id)
    .bind(entry.service_date)
    .bind(entry.time_in)
    .bind(&entry.task_description)
    .bind(&entry.photos)
    .bind(entry.status.as_str())
    .execute(pool)
    .await?;

    tracing::info!(
        application = %application.id,
        entry = %entry.id,
        date = %service_date,
        "service session started"
    );
    Ok(entry)
}

/// Closes a session: credits the computed hours and stores up to five
/// photos. Photos written before a failure are removed again.
pub async fn end_service_entry(
    pool: &PgPool,
    file_store: &dyn FileStore,
    profile: &StudentProfile,
    entry_id: Uuid,
    time_out: Option<NaiveTime>,
    lessons_learned: Option<&str>,
    photo_paths: &[std::path::PathBuf],
    now: DateTime<Utc>,
) -> anyhow::Result<CommunityServiceEntry> {
    let entry = entry_by_id(pool, entry_id).await?;
    let application = application_by_id(pool, entry.application_id).await?;
    workflow::ensure_owner(profile, &application)?;

    let session = service::close_entry(&entry, time_out, photo_paths.len(), now)?;

    let mut photo_refs: Vec<String> = Vec::new();
    for (index, path) in photo_paths.iter().enumerate() {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .context("photo path has no file name")?;
        let bytes = store::read_upload(path);
        let stored = bytes.and_then(|bytes| {
            file_store.store(
                &bytes,
                &format!("photos/{}/{}/{index:02}-{file_name}", application.id, entry.id),
            )
        });
        match stored {
            Ok(file_ref) => photo_refs.push(file_ref),
            Err(err) => {
                for file_ref in &photo_refs {
                    let _ = file_store.delete(file_ref);
                }
                return Err(err.into());
            }
        }
    }

    let updated = sqlx::query(
        "UPDATE scholarship_workflow.community_service_entries \
         SET time_out = $1, lessons_learned = $2, photos = $3, hours_completed = $4, \
             status = $5 \
         WHERE id = $6 AND status = $7",
    )
    .bind(session.time_out)
    .bind(lessons_learned)
    .bind(&photo_refs)
    .bind(session.hours)
    .bind(EntryStatus::Completed.as_str())
    .bind(entry.id)
    .bind(EntryStatus::InProgress.as_str())
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        for file_ref in &photo_refs {
            let _ = file_store.delete(file_ref);
        }
        anyhow::bail!("service entry {} changed concurrently; retry", entry.id);
    }

    tracing::info!(
        application = %application.id,
        entry = %entry.id,
        hours = %session.hours,
        "service session completed"
    );
    let mut completed = entry;
    completed.time_out = Some(session.time_out);
    completed.lessons_learned = lessons_learned.map(str::to_string);
    completed.photos = photo_refs;
    completed.hours_completed = Some(session.hours);
    completed.status = EntryStatus::Completed;
    Ok(completed)
}

pub async fn cancel_service_entry(
    pool: &PgPool,
    profile: &StudentProfile,
    entry_id: Uuid,
) -> anyhow::Result<()> {
    let entry = entry_by_id(pool, entry_id).await?;
    let application = application_by_id(pool, entry.application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    service::validate_cancel_entry(&entry)?;

    sqlx::query(
        "DELETE FROM scholarship_workflow.community_service_entries \
         WHERE id = $1 AND status = $2",
    )
    .bind(entry.id)
    .bind(EntryStatus::InProgress.as_str())
    .execute(pool)
    .await?;
    tracing::info!(entry = %entry.id, "service session cancelled");
    Ok(())
}

async fn insert_report_and_update_status(
    pool: &PgPool,
    application: &ScholarshipApplication,
    report: &CommunityServiceReport,
) -> anyhow::Result<()> {
    let next = workflow::transition(application.status, Action::SubmitServiceReport)?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO scholarship_workflow.community_service_reports \
         (id, application_id, report_type, file_ref, description, lessons_learned, \
          days_completed, total_hours, status, submitted_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(report.id)
    .bind(report.application_id)
    .bind(report.report_type.as_str())
    .bind(&report.file_ref)
    .bind(&report.description)
    .bind(&report.lessons_learned)
    .bind(report.days_completed)
    .bind(report.total_hours)
    .bind(report.status.as_str())
    .bind(report.submitted_at)
    .execute(&mut *tx)
    .await?;

    if next != application.status {
        let updated = sqlx::query(
            "UPDATE scholarship_workflow.scholarship_applications \
             SET status = $1 WHERE id = $2 AND status = $3",
        )
        .bind(next.as_str())
        .bind(application.id)
        .bind(application.status.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            anyhow::bail!(
                "application {} changed concurrently; retry",
                application.id
            );
        }
    }
    tx.commit().await?;

    tracing::info!(
        application = %application.id,
        report = %report.id,
        report_type = %report.report_type,
        days = %report.days_completed,
        "service report submitted"
    );
    Ok(())
}

pub async fn submit_tracked_report(
    pool: &PgPool,
    profile: &StudentProfile,
    application_id: Uuid,
    input: TrackedReportInput,
    now: DateTime<Utc>,
) -> anyhow::Result<CommunityServiceReport> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;

    let program = program_by_id(pool, application.scholarship_program_id).await?;
    let prior = reports_for_application(pool, application.id).await?;
    let credit = service::validate_tracked_report(
        &input,
        program.community_service_days,
        &prior,
        now.date_naive(),
    )?;

    let report = CommunityServiceReport {
        id: Uuid::new_v4(),
        application_id: application.id,
        report_type: ReportType::Tracked,
        file_ref: None,
        description: Some(input.description),
        lessons_learned: input.lessons_learned,
        days_completed: credit.days_completed,
        total_hours: credit.total_hours,
        status: ReviewStatus::PendingReview,
        rejection_reason: None,
        submitted_at: now,
        reviewed_at: None,
    };
    insert_report_and_update_status(pool, &application, &report).await?;
    Ok(report)
}

pub async fn submit_pdf_report(
    pool: &PgPool,
    file_store: &dyn FileStore,
    profile: &StudentProfile,
    application_id: Uuid,
    pdf_path: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<CommunityServiceReport> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;

    let file_name = pdf_path
        .file_name()
        .and_then(|name| name.to_str())
        .context("PDF path has no file name")?;
    let bytes = store::read_upload(pdf_path)?;
    service::validate_pdf_file(file_name, bytes.len() as u64)?;

    let program = program_by_id(pool, application.scholarship_program_id).await?;
    let prior = reports_for_application(pool, application.id).await?;
    let credit = service::pdf_report_credit(program.community_service_days, &prior);

    let file_ref = format!("reports/{}/{}-{file_name}", application.id, Uuid::new_v4());
    let report = CommunityServiceReport {
        id: Uuid::new_v4(),
        application_id: application.id,
        report_type: ReportType::PdfUpload,
        file_ref: Some(file_ref.clone()),
        description: None,
        lessons_learned: None,
        days_completed: credit.days_completed,
        total_hours: credit.total_hours,
        status: ReviewStatus::PendingReview,
        rejection_reason: None,
        submitted_at: now,
        reviewed_at: None,
    };
    file_store.store(&bytes, &file_ref)?;

    if let Err(err) = insert_report_and_update_status(pool, &application, &report).await {
        let _ = file_store.delete(&file_ref);
        return Err(err);
    }
    Ok(report)
}

pub async fn undo_report(
    pool: &PgPool,
    file_store: &dyn FileStore,
    profile: &StudentProfile,
    report_id: Uuid,
) -> anyhow::Result<()> {
    let report = report_by_id(pool, report_id).await?;
    let application = application_by_id(pool, report.application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    service::validate_undo_report(&report)?;

    sqlx::query("DELETE FROM scholarship_workflow.community_service_reports WHERE id = $1")
        .bind(report.id)
        .execute(pool)
        .await?;
    if let Some(file_ref) = &report.file_ref {
        let _ = file_store.delete(file_ref);
    }
    tracing::info!(report = %report.id, application = %application.id, "report withdrawn");
    Ok(())
}

pub async fn undo_service_completion(
    pool: &PgPool,
    profile: &StudentProfile,
    application_id: Uuid,
) -> anyhow::Result<ApplicationStatus> {
    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    let next = workflow::transition(application.status, Action::UndoServiceCompletion)?;
    persist_status(pool, &application, next, None, None).await?;
    Ok(next)
}

/// Admin review of a single document upload. Called by the review surface;
/// the approval aggregate is recomputed on demand, never cached.
pub async fn review_document(
    pool: &PgPool,
    upload_id: Uuid,
    approve: bool,
    rejection_reason: Option<&str>,
) -> anyhow::Result<ReviewStatus> {
    let status = if approve {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Rejected
    };
    let updated = sqlx::query(
        "UPDATE scholarship_workflow.document_uploads \
         SET status = $1, rejection_reason = $2 WHERE id = $3",
    )
    .bind(status.as_str())
    .bind(rejection_reason)
    .bind(upload_id)
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        anyhow::bail!("no document upload {upload_id}");
    }
    tracing::info!(upload = %upload_id, status = %status, "document reviewed");
    Ok(status)
}

/// Admin review of a service report. Approving the last pending report
/// promotes a service-pending application to service-completed.
pub async fn review_report(
    pool: &PgPool,
    report_id: Uuid,
    approve: bool,
    rejection_reason: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<ReviewStatus> {
    let report = report_by_id(pool, report_id).await?;
    let status = if approve {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Rejected
    };
    sqlx::query(
        "UPDATE scholarship_workflow.community_service_reports \
         SET status = $1, rejection_reason = $2, reviewed_at = $3 WHERE id = $4",
    )
    .bind(status.as_str())
    .bind(rejection_reason)
    .bind(now)
    .bind(report.id)
    .execute(pool)
    .await?;
    tracing::info!(report = %report.id, status = %status, "service report reviewed");

    if approve {
        let application = application_by_id(pool, report.application_id).await?;
        let reports = reports_for_application(pool, application.id).await?;
        if application.status == ApplicationStatus::ServicePending
            && workflow::can_complete_service(&reports)
        {
            let next = workflow::transition(application.status, Action::CompleteService)?;
            persist_status(pool, &application, next, None, Some(now)).await?;
        }
    }
    Ok(status)
}

/// Admin-side transition with its aggregate preconditions. The transition
/// table still has the final say; this only adds the derived-fact gates.
pub async fn advance_application(
    pool: &PgPool,
    application_id: Uuid,
    action: Action,
    now: DateTime<Utc>,
) -> anyhow::Result<ApplicationStatus> {
    let application = application_by_id(pool, application_id).await?;
    let next = workflow::transition(application.status, action)?;

    match action {
        Action::ApproveDocuments => {
            let requirements =
                requirements_for_program(pool, application.scholarship_program_id).await?;
            let uploads = uploads_for_application(pool, application.id).await?;
            if !workflow::can_approve_documents(&requirements, &uploads) {
                return Err(WorkflowError::Validation {
                    message: "not every required document is approved".to_string(),
                }
                .into());
            }
        }
        Action::CompleteService => {
            let reports = reports_for_application(pool, application.id).await?;
            if !workflow::can_complete_service(&reports) {
                return Err(WorkflowError::Validation {
                    message: "not every service report is approved".to_string(),
                }
                .into());
            }
        }
        Action::Complete => {
            let disbursements = disbursements_for_application(pool, application.id).await?;
            if !workflow::can_process_disbursement(&disbursements) {
                return Err(WorkflowError::Validation {
                    message: "no processed disbursement is recorded".to_string(),
                }
                .into());
            }
        }
        _ => {}
    }

    persist_status(pool, &application, next, None, Some(now)).await?;
    Ok(next)
}

/// Records a pending disbursement and moves the application into the
/// disbursement phase.
pub async fn record_disbursement(
    pool: &PgPool,
    application_id: Uuid,
    amount: Decimal,
    payment_method: &str,
    reference_number: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<Disbursement> {
    let application = application_by_id(pool, application_id).await?;
    let next = workflow::transition(application.status, Action::BeginDisbursement)?;

    let disbursement = Disbursement {
        id: Uuid::new_v4(),
        application_id: application.id,
        amount,
        status: DisbursementStatus::Pending,
        payment_method: payment_method.to_string(),
        reference_number: reference_number.to_string(),
        disbursed_at: None,
    };
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO scholarship_workflow.disbursements \
         (id, application_id, amount, status, payment_method, reference_number) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(disbursement.id)
    .bind(disbursement.application_id)
    .bind(disbursement.amount)
    .bind(disbursement.status.as_str())
    .bind(&disbursement.payment_method)
    .bind(&disbursement.reference_number)
    .execute(&mut *tx)
    .await?;
    let updated = sqlx::query(
        "UPDATE scholarship_workflow.scholarship_applications \
         SET status = $1, reviewed_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(next.as_str())
    .bind(now)
    .bind(application.id)
    .bind(application.status.as_str())
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        tx.rollback().await.ok();
        anyhow::bail!("application {} changed concurrently; retry", application.id);
    }
    tx.commit().await?;

    tracing::info!(
        application = %application.id,
        disbursement = %disbursement.id,
        amount = %amount,
        "disbursement recorded"
    );
    Ok(disbursement)
}

/// Marks the disbursement paid out and advances the application.
pub async fn process_disbursement(
    pool: &PgPool,
    application_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<ApplicationStatus> {
    let application = application_by_id(pool, application_id).await?;
    let next = workflow::transition(application.status, Action::ProcessDisbursement)?;

    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        "UPDATE scholarship_workflow.disbursements \
         SET status = $1, disbursed_at = $2 \
         WHERE application_id = $3 AND status = $4",
    )
    .bind(DisbursementStatus::Processed.as_str())
    .bind(now)
    .bind(application.id)
    .bind(DisbursementStatus::Pending.as_str())
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        tx.rollback().await.ok();
        anyhow::bail!("no pending disbursement for application {}", application.id);
    }
    let advanced = sqlx::query(
        "UPDATE scholarship_workflow.scholarship_applications \
         SET status = $1, reviewed_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(next.as_str())
    .bind(now)
    .bind(application.id)
    .bind(application.status.as_str())
    .execute(&mut *tx)
    .await?;
    if advanced.rows_affected() == 0 {
        tx.rollback().await.ok();
        anyhow::bail!("application {} changed concurrently; retry", application.id);
    }
    tx.commit().await?;

    tracing::info!(application = %application.id, "disbursement processed");
    Ok(next)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let programs = vec![
        (
            Uuid::parse_str("8f2b6c1d-4e5a-4b8c-9d2e-1f3a5b7c9d0e")?,
            "STEM Futures Grant",
            "both",
            5,
            NaiveDate::from_ymd_opt(2026, 6, 30).context("invalid date")?,
            6,
        ),
        (
            Uuid::parse_str("2a4c6e8f-1b3d-4f5a-8c9e-0d2f4a6b8c1d")?,
            "Community Leaders Award",
            "college",
            2,
            NaiveDate::from_ymd_opt(2026, 5, 15).context("invalid date")?,
            10,
        ),
        (
            Uuid::parse_str("7c9e1f3a-5b7d-4a6c-8e0f-2a4b6c8d0e2f")?,
            "Senior High Bridge Fund",
            "high_school",
            8,
            NaiveDate::from_ymd_opt(2026, 4, 30).context("invalid date")?,
            4,
        ),
    ];

    for (id, name, eligibility_value, slots, deadline, service_days) in programs {
        sqlx::query(
            r#"
            INSERT INTO scholarship_workflow.scholarship_programs
            (id, name, total_budget, amount_per_slot, available_slots,
             school_type_eligibility, min_gpa, min_units, application_deadline,
             community_service_days, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
            ON CONFLICT (name) DO UPDATE
            SET available_slots = EXCLUDED.available_slots,
                application_deadline = EXCLUDED.application_deadline,
                community_service_days = EXCLUDED.community_service_days
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Decimal::from(500_000))
        .bind(Decimal::from(25_000))
        .bind(slots)
        .bind(eligibility_value)
        .bind(Decimal::new(25, 1))
        .bind(12)
        .bind(deadline)
        .bind(service_days)
        .execute(pool)
        .await?;

        for (requirement, description, is_required) in [
            ("transcript", "Latest grading period transcript of records", true),
            ("enrollment_proof", "Certificate of enrollment", true),
            ("essay", "Personal statement, 500 words minimum", false),
        ] {
            sqlx::query(
                r#"
                INSERT INTO scholarship_workflow.document_requirements
                (id, scholarship_program_id, name, description, is_required)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (scholarship_program_id, name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(requirement)
            .bind(description)
            .bind(is_required)
            .execute(pool)
            .await?;
        }
    }

    let profiles = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@example.com",
            "college",
            "Bayview College",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@example.com",
            "high_school",
            "Harborside Senior High",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@example.com",
            "college",
            "Bayview College",
        ),
    ];

    for (id, full_name, email, school_type, school_name) in profiles {
        sqlx::query(
            r#"
            INSERT INTO scholarship_workflow.student_profiles
            (id, user_id, full_name, email, phone, address, school_name, school_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, school_type = EXCLUDED.school_type
            "#,
        )
        .bind(id)
        .bind(Uuid::new_v4())
        .bind(full_name)
        .bind(email)
        .bind("555-0100")
        .bind("12 Harbor St")
        .bind(school_name)
        .bind(school_type)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Imports historical, already-closed service sessions from a CSV file.
/// Each row runs through the same interval validation a live session gets;
/// bad rows are skipped and reported, good rows are credited.
pub async fn import_entries(
    pool: &PgPool,
    profile: &StudentProfile,
    application_id: Uuid,
    csv_path: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<(usize, usize)> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        service_date: NaiveDate,
        time_in: NaiveTime,
        time_out: NaiveTime,
        task_description: String,
        lessons_learned: Option<String>,
    }

    let application = application_by_id(pool, application_id).await?;
    workflow::ensure_owner(profile, &application)?;
    service_logging_allowed(application.status)?;

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let session = match crate::timesheet::compute_hours(
            row.service_date,
            row.time_in,
            Some(row.time_out),
            now,
        ) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(
                    date = %row.service_date,
                    error = %err,
                    "skipping service session with invalid interval"
                );
                skipped += 1;
                continue;
            }
        };

        sqlx::query(
            r#"
            INSERT INTO scholarship_workflow.community_service_entries
            (id, application_id, service_date, time_in, time_out, task_description,
             lessons_learned, photos, hours_completed, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(application.id)
        .bind(row.service_date)
        .bind(row.time_in)
        .bind(session.time_out)
        .bind(&row.task_description)
        .bind(&row.lessons_learned)
        .bind(Vec::<String>::new())
        .bind(session.hours)
        .bind(EntryStatus::Completed.as_str())
        .execute(pool)
        .await?;
        inserted += 1;
    }

    Ok((inserted, skipped))
}
