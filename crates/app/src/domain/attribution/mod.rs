//! Referral Attribution

pub mod data;
pub mod errors;
pub mod service;

pub use errors::AttributionServiceError;
pub use service::*;
