//! Payout Errors

use salvo::http::StatusError;
use tracing::error;

use affiliates_app::domain::payouts::PayoutsServiceError;

pub(crate) fn into_status_error(error: PayoutsServiceError) -> StatusError {
    match error {
        PayoutsServiceError::NotFound => StatusError::not_found().brief("Payout request not found"),
        error @ (PayoutsServiceError::NotOnboarded
        | PayoutsServiceError::NoClearedFunds
        | PayoutsServiceError::BelowMinimum { .. }
        | PayoutsServiceError::InvalidReason) => {
            StatusError::unprocessable_entity().brief(error.to_string())
        }
        error @ (PayoutsServiceError::RequestAlreadyPending
        | PayoutsServiceError::AlreadyExists
        | PayoutsServiceError::AlreadyProcessed
        | PayoutsServiceError::ApprovalInProgress
        | PayoutsServiceError::TransferAlreadyIssued
        | PayoutsServiceError::SettlementMismatch { .. }) => {
            StatusError::conflict().brief(error.to_string())
        }
        PayoutsServiceError::Transfer(source) => {
            error!("payout transfer failed: {source}");

            StatusError::bad_gateway()
                .brief(format!("payout transfer failed: {source}"))
                .cause(source)
        }
        PayoutsServiceError::InvalidReference
        | PayoutsServiceError::MissingRequiredData
        | PayoutsServiceError::InvalidData => {
            StatusError::bad_request().brief("Invalid payout request")
        }
        PayoutsServiceError::InvariantViolation(detail) => {
            error!("payout invariant violated: {detail}");

            StatusError::internal_server_error()
        }
        error @ (PayoutsServiceError::AmountOverflow | PayoutsServiceError::OutOfRange(_)) => {
            error!("payout amount out of range: {error}");

            StatusError::internal_server_error()
        }
        PayoutsServiceError::Sql(source) => {
            error!("payout storage error: {source}");

            StatusError::internal_server_error()
        }
    }
}
