//! Affiliate Domain Concerns

use thiserror::Error;

pub mod affiliates;
pub mod attribution;
pub mod clearance;
pub mod payouts;
pub mod referrals;
pub mod users;

/// A stored status string no variant matches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status `{0}`")]
pub struct UnknownStatus(pub String);
