//! Attribution service errors.

use thiserror::Error;

use crate::domain::{affiliates::AffiliatesServiceError, referrals::ReferralsServiceError};

#[derive(Debug, Error)]
pub enum AttributionServiceError {
    #[error("affiliate lookup failed")]
    Affiliates(#[from] AffiliatesServiceError),

    #[error("ledger append failed")]
    Referrals(#[from] ReferralsServiceError),
}
