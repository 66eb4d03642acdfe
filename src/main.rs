use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod db;
mod documents;
mod eligibility;
mod error;
mod models;
mod report;
mod service;
mod store;
mod timesheet;
mod workflow;

use service::TrackedReportInput;
use store::LocalFileStore;
use workflow::Action;

#[derive(Parser)]
#[command(name = "scholarship-workflow")]
#[command(about = "Scholarship application and community-service workflow", long_about = None)]
struct Cli {
    /// Root directory for stored documents, photos, and PDF reports
    #[arg(long, default_value = "uploads", global = true)]
    store_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// List programs with remaining slots and the student's apply verdict
    Programs {
        #[arg(long)]
        student: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Create a draft application for a program
    Apply {
        #[arg(long)]
        student: String,
        #[arg(long)]
        program: String,
    },
    /// Submit a draft application (requires a full document set)
    Submit {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
    },
    /// Cancel an application that has not entered the approval phase
    Cancel {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
    },
    /// Upload (or replace) the document for one requirement
    UploadDocument {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        requirement: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Start a live community-service session
    StartSession {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        time_in: NaiveTime,
        #[arg(long)]
        task: String,
    },
    /// End a session; omit --time-out to close a live same-day session now
    EndSession {
        #[arg(long)]
        student: String,
        #[arg(long)]
        entry: Uuid,
        #[arg(long)]
        time_out: Option<NaiveTime>,
        #[arg(long)]
        lessons: Option<String>,
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
    },
    /// Abandon an in-progress session (hard delete)
    CancelSession {
        #[arg(long)]
        student: String,
        #[arg(long)]
        entry: Uuid,
    },
    /// Submit a tracked community-service report
    SubmitReport {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        description: String,
        #[arg(long)]
        total_hours: Decimal,
        #[arg(long)]
        service_date: NaiveDate,
        #[arg(long)]
        lessons: Option<String>,
    },
    /// Submit a PDF community-service report covering the remaining days
    SubmitPdfReport {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        file: PathBuf,
    },
    /// Withdraw a report that has not been approved
    UndoReport {
        #[arg(long)]
        student: String,
        #[arg(long)]
        report: Uuid,
    },
    /// Revert a service-completed application to service-pending
    UndoCompletion {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
    },
    /// Import historical, already-closed service sessions from a CSV file
    ImportEntries {
        #[arg(long)]
        student: String,
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write a markdown status report for one application
    Report {
        #[arg(long)]
        application: Uuid,
        #[arg(long, default_value = "status.md")]
        out: PathBuf,
    },
    /// Reviewer-side operations
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Approve or reject a document upload
    ReviewDocument {
        #[arg(long)]
        upload: Uuid,
        #[arg(long, default_value_t = false)]
        reject: bool,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Approve or reject a community-service report
    ReviewReport {
        #[arg(long)]
        report: Uuid,
        #[arg(long, default_value_t = false)]
        reject: bool,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Advance an application one workflow step
    Advance {
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        action: String,
    },
    /// Record a pending disbursement
    Disburse {
        #[arg(long)]
        application: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        method: String,
        #[arg(long)]
        reference: String,
    },
    /// Mark the pending disbursement as paid out
    ProcessDisbursement {
        #[arg(long)]
        application: Uuid,
    },
}

fn parse_admin_action(value: &str) -> anyhow::Result<Action> {
    let action = match value {
        "request-documents" => Action::RequestDocuments,
        "begin-document-review" => Action::BeginDocumentReview,
        "approve-documents" => Action::ApproveDocuments,
        "reject-documents" => Action::RejectDocuments,
        "verify-eligibility" => Action::VerifyEligibility,
        "enroll" => Action::Enroll,
        "complete-service" => Action::CompleteService,
        "complete" => Action::Complete,
        "reject" => Action::Reject,
        "archive" => Action::Archive,
        other => anyhow::bail!("unknown admin action '{other}'"),
    };
    Ok(action)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholarship_workflow=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let file_store = LocalFileStore::new(&cli.store_root);
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Programs { student, json } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let listings = db::list_programs(&pool, &profile, now.date_naive()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listings)?);
            } else if listings.is_empty() {
                println!("No programs found.");
            } else {
                for listing in &listings {
                    let verdict = if listing.can_apply {
                        "can apply".to_string()
                    } else {
                        listing
                            .ineligible_reason
                            .clone()
                            .unwrap_or_else(|| "ineligible".to_string())
                    };
                    println!(
                        "- {} ({}, deadline {}, {} slots left, {} service days): {}",
                        listing.name,
                        listing.school_type_eligibility,
                        listing.application_deadline,
                        listing.remaining_slots,
                        listing.community_service_days,
                        verdict
                    );
                }
            }
        }
        Commands::Apply { student, program } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let application = db::create_application(&pool, &profile, &program, now).await?;
            println!("Draft application {} created.", application.id);
        }
        Commands::Submit {
            student,
            application,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let status = db::submit_application(&pool, &profile, application, now).await?;
            println!("Application {application} is now {status}.");
        }
        Commands::Cancel {
            student,
            application,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let status = db::cancel_application(&pool, &profile, application, now).await?;
            println!("Application {application} is now {status}.");
        }
        Commands::UploadDocument {
            student,
            application,
            requirement,
            file,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let upload = db::upload_document(
                &pool,
                &file_store,
                &profile,
                application,
                &requirement,
                &file,
                now,
            )
            .await?;
            println!("Stored '{}' as {}.", requirement, upload.file_ref);
        }
        Commands::StartSession {
            student,
            application,
            date,
            time_in,
            task,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let entry = db::start_service_entry(
                &pool, &profile, application, date, time_in, &task, now,
            )
            .await?;
            println!("Session {} started at {} on {}.", entry.id, time_in, date);
        }
        Commands::EndSession {
            student,
            entry,
            time_out,
            lessons,
            photos,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let completed = db::end_service_entry(
                &pool,
                &file_store,
                &profile,
                entry,
                time_out,
                lessons.as_deref(),
                &photos,
                now,
            )
            .await?;
            let hours = completed
                .hours_completed
                .map(|hours| hours.to_string())
                .unwrap_or_default();
            println!("Session {entry} completed with {hours} hours.");
        }
        Commands::CancelSession { student, entry } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            db::cancel_service_entry(&pool, &profile, entry).await?;
            println!("Session {entry} cancelled.");
        }
        Commands::SubmitReport {
            student,
            application,
            description,
            total_hours,
            service_date,
            lessons,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let input = TrackedReportInput {
                description,
                total_hours,
                service_date,
                lessons_learned: lessons,
            };
            let submitted =
                db::submit_tracked_report(&pool, &profile, application, input, now).await?;
            println!(
                "Report {} submitted: {} days ({} hours) pending review.",
                submitted.id, submitted.days_completed, submitted.total_hours
            );
        }
        Commands::SubmitPdfReport {
            student,
            application,
            file,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let submitted =
                db::submit_pdf_report(&pool, &file_store, &profile, application, &file, now)
                    .await?;
            println!(
                "PDF report {} submitted covering {} remaining days.",
                submitted.id, submitted.days_completed
            );
        }
        Commands::UndoReport { student, report } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            db::undo_report(&pool, &file_store, &profile, report).await?;
            println!("Report {report} withdrawn.");
        }
        Commands::UndoCompletion {
            student,
            application,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let status = db::undo_service_completion(&pool, &profile, application).await?;
            println!("Application {application} is now {status}.");
        }
        Commands::ImportEntries {
            student,
            application,
            csv,
        } => {
            let profile = db::profile_by_email(&pool, &student).await?;
            let (inserted, skipped) =
                db::import_entries(&pool, &profile, application, &csv, now).await?;
            println!(
                "Imported {inserted} sessions from {} ({skipped} skipped).",
                csv.display()
            );
        }
        Commands::Report { application, out } => {
            let record = db::application_by_id(&pool, application).await?;
            let program = db::program_by_id(&pool, record.scholarship_program_id).await?;
            let profile = db::profile_by_id(&pool, record.student_profile_id).await?;
            let requirements = db::requirements_for_program(&pool, program.id).await?;
            let uploads = db::uploads_for_application(&pool, record.id).await?;
            let entries = db::entries_for_application(&pool, record.id).await?;
            let reports = db::reports_for_application(&pool, record.id).await?;
            let disbursements = db::disbursements_for_application(&pool, record.id).await?;
            let checklist = documents::document_status(&requirements, &uploads);
            let rendered = report::build_status_report(
                &program,
                &profile,
                &record,
                &checklist,
                &entries,
                &reports,
                &disbursements,
            );
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Admin(admin) => match admin {
            AdminCommands::ReviewDocument {
                upload,
                reject,
                reason,
            } => {
                let status =
                    db::review_document(&pool, upload, !reject, reason.as_deref()).await?;
                println!("Upload {upload} is now {status}.");
            }
            AdminCommands::ReviewReport {
                report,
                reject,
                reason,
            } => {
                let status =
                    db::review_report(&pool, report, !reject, reason.as_deref(), now).await?;
                println!("Report {report} is now {status}.");
            }
            AdminCommands::Advance {
                application,
                action,
            } => {
                let action = parse_admin_action(&action)?;
                let status = db::advance_application(&pool, application, action, now).await?;
                println!("Application {application} is now {status}.");
            }
            AdminCommands::Disburse {
                application,
                amount,
                method,
                reference,
            } => {
                let disbursement = db::record_disbursement(
                    &pool,
                    application,
                    amount,
                    &method,
                    &reference,
                    now,
                )
                .await?;
                println!(
                    "Disbursement {} of {} recorded as pending.",
                    disbursement.id, disbursement.amount
                );
            }
            AdminCommands::ProcessDisbursement { application } => {
                let status = db::process_disbursement(&pool, application, now).await?;
                println!("Application {application} is now {status}.");
            }
        },
    }

    Ok(())
}
