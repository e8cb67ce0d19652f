// ⚠️ Enforcement Errors - what the core reports back to its callers
//
// Every variant carries the values a collaborator needs to explain the
// failure (proposed vs computed amounts, offending dates). Wording shown to
// the operator is the collaborator's business, not ours.

use chrono::NaiveDate;
use thiserror::Error;

use crate::entities::ParcelStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnforcementError {
    #[error("no parcel with id {parcel_id}")]
    ParcelNotFound { parcel_id: i64 },

    #[error("no weekly rate in effect on {date} (date precedes all rate history)")]
    NoApplicableRate { date: NaiveDate },

    #[error("settlement of ${proposed:.2} exceeds current arrears of ${arrears:.2}")]
    InvalidSettlement { proposed: f64, arrears: f64 },

    #[error("settlement of ${proposed:.2} is below the policy floor of ${minimum:.2}")]
    BelowPolicyFloor { proposed: f64, minimum: f64 },

    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    #[error("cannot move parcel from {from} to {to}: {reason}")]
    IllegalTransition {
        from: ParcelStatus,
        to: ParcelStatus,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl EnforcementError {
    pub fn invariant(message: impl Into<String>) -> Self {
        EnforcementError::InvariantViolation {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for EnforcementError {
    fn from(err: rusqlite::Error) -> Self {
        EnforcementError::Storage(err.to_string())
    }
}

pub type EnforcementResult<T> = Result<T, EnforcementError>;
