//! Affiliates service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::payout_provider::PayoutProviderError;

#[derive(Debug, Error)]
pub enum AffiliatesServiceError {
    #[error("affiliate already exists")]
    AlreadyExists,

    #[error("affiliate not found")]
    NotFound,

    #[error("could not find a free referral code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: usize },

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("payout provider error")]
    Provider(#[from] PayoutProviderError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for AffiliatesServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
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
