//! Payouts service errors.

use std::num::TryFromIntError;

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::{
    database::violates_unique_constraint,
    domain::{
        clearance::CLEARANCE_BUSINESS_DAYS,
        payouts::{data::format_dollars, repository::ONE_PENDING_PER_AFFILIATE},
    },
    payout_provider::PayoutProviderError,
};

#[derive(Debug, Error)]
pub enum PayoutsServiceError {
    #[error("payout request already exists")]
    AlreadyExists,

    #[error("payout request not found")]
    NotFound,

    #[error("complete payout onboarding before requesting a payout")]
    NotOnboarded,

    #[error("a payout request is already pending")]
    RequestAlreadyPending,

    #[error(
        "no cleared earnings available; commissions clear {} business days after the payment",
        CLEARANCE_BUSINESS_DAYS
    )]
    NoClearedFunds,

    #[error(
        "minimum payout is {}; cleared earnings are {}",
        format_dollars(*minimum),
        format_dollars(*cleared)
    )]
    BelowMinimum { cleared: u64, minimum: u64 },

    #[error("payout request has already been processed")]
    AlreadyProcessed,

    #[error("cleared referrals sum to {derived} but {quoted} was requested")]
    SettlementMismatch { quoted: u64, derived: u64 },

    #[error("a rejection reason is required")]
    InvalidReason,

    #[error("funds have already been transferred for this payout request")]
    TransferAlreadyIssued,

    #[error("payout request is being approved")]
    ApprovalInProgress,

    #[error("payout transfer failed")]
    Transfer(#[source] PayoutProviderError),

    #[error("payout invariant violated: {0}")]
    InvariantViolation(String),

    #[error("amount overflowed")]
    AmountOverflow,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),

    #[error("value out of range")]
    OutOfRange(#[from] TryFromIntError),
}

impl From<Error> for PayoutsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        if violates_unique_constraint(&error, ONE_PENDING_PER_AFFILIATE) {
            return Self::RequestAlreadyPending;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_minimum_message_quotes_dollars() {
        let error = PayoutsServiceError::BelowMinimum {
            cleared: 999,
            minimum: 1000,
        };

        assert_eq!(
            error.to_string(),
            "minimum payout is $10.00; cleared earnings are $9.99"
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            PayoutsServiceError::from(Error::RowNotFound),
            PayoutsServiceError::NotFound
        ));
    }
}
