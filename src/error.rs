use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::ApplicationStatus;
use crate::workflow::Action;

/// Typed failures surfaced by every workflow operation. Validation and
/// business-rule variants are safe to show to the student directly; storage
/// failures roll the operation back and should be retried.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed or missing input.
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// The application is not in a state that permits the attempted action.
    #[error("cannot {action} an application in status '{current}'")]
    InvalidTransition {
        current: ApplicationStatus,
        action: Action,
    },

    /// The acting student does not own the record being mutated.
    #[error("this application belongs to another student")]
    Forbidden,

    /// An in-progress service session already exists for this date.
    #[error("a service session is already in progress for {service_date}")]
    DuplicateActiveSession { service_date: NaiveDate },

    /// A tracked report claims more days than the program still requires.
    #[error(
        "report claims {requested_days} days but only {remaining_days} days \
         ({remaining_hours} hours) remain"
    )]
    ExceedsRemainingDays {
        requested_days: Decimal,
        remaining_days: Decimal,
        remaining_hours: Decimal,
    },

    /// Approved reports cannot be withdrawn by the student.
    #[error("an approved report cannot be undone")]
    CannotUndoApproved,

    /// Time-out does not fall strictly after time-in.
    #[error("time out {time_out} must be later than time in {time_in}")]
    InvalidInterval {
        time_in: NaiveTime,
        time_out: NaiveTime,
    },

    /// Computed session duration came out zero or negative.
    #[error("session duration of {hours} hours is not positive")]
    NonPositiveDuration { hours: Decimal },

    /// More photos supplied than an entry may carry.
    #[error("{supplied} photos supplied but at most {max} are allowed")]
    TooManyPhotos { supplied: usize, max: usize },

    /// File store operation failed; the transaction was rolled back.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// The program has no remaining slots.
    #[error("program '{program}' has no remaining slots")]
    CapacityExceeded { program: String },
}
