//! Affiliate Errors

use salvo::http::StatusError;
use tracing::error;

use affiliates_app::domain::{
    affiliates::AffiliatesServiceError, referrals::ReferralsServiceError,
};

pub(crate) fn into_status_error(error: AffiliatesServiceError) -> StatusError {
    match error {
        AffiliatesServiceError::NotFound => StatusError::not_found().brief("Affiliate not found"),
        AffiliatesServiceError::AlreadyExists => {
            StatusError::conflict().brief("Affiliate already exists")
        }
        AffiliatesServiceError::InvalidReference
        | AffiliatesServiceError::MissingRequiredData
        | AffiliatesServiceError::InvalidData => {
            StatusError::bad_request().brief("Invalid affiliate payload")
        }
        AffiliatesServiceError::Provider(source) => {
            error!("payout provider call failed: {source}");

            StatusError::bad_gateway()
                .brief("Payout provider is unavailable, try again shortly")
                .cause(source)
        }
        error @ AffiliatesServiceError::CodeGenerationExhausted { .. } => {
            error!("failed to register affiliate: {error}");

            StatusError::internal_server_error()
        }
        AffiliatesServiceError::Sql(source) => {
            error!("affiliate storage error: {source}");

            StatusError::internal_server_error()
        }
    }
}

pub(crate) fn ledger_status_error(error: ReferralsServiceError) -> StatusError {
    match error {
        ReferralsServiceError::NotFound => StatusError::not_found().brief("Affiliate not found"),
        ReferralsServiceError::AlreadyExists | ReferralsServiceError::DuplicateCharge { .. } => {
            StatusError::conflict().brief("Referral already recorded")
        }
        ReferralsServiceError::AffiliateInactive => {
            StatusError::conflict().brief("Affiliate is inactive")
        }
        ReferralsServiceError::InvalidReference
        | ReferralsServiceError::MissingRequiredData
        | ReferralsServiceError::InvalidData => {
            StatusError::bad_request().brief("Invalid referral payload")
        }
        ReferralsServiceError::AmountOverflow => {
            error!("ledger amounts overflowed");

            StatusError::internal_server_error()
        }
        ReferralsServiceError::Sql(source) => {
            error!("ledger storage error: {source}");

            StatusError::internal_server_error()
        }
    }
}
