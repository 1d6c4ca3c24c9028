//! Referral Records

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{UnknownStatus, affiliates::records::AffiliateUuid, clearance, users::UserUuid},
    uuids::TypedUuid,
};

/// Referral UUID
pub type ReferralUuid = TypedUuid<ReferralRecord>;

/// Settlement state of a commission.
///
/// Whether a pending commission has cleared is derived from `created_at`
/// and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Paid,
}

impl ReferralStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Referral Record
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralRecord {
    pub uuid: ReferralUuid,
    pub affiliate_uuid: AffiliateUuid,
    pub referred_user_uuid: UserUuid,

    /// Billing charge that produced the commission. Unique across the ledger.
    pub subscription_charge_id: String,

    /// Gross charge, in cents.
    pub charge_amount: u64,

    /// Affiliate's share of the charge, in cents.
    pub commission_amount: u64,

    pub status: ReferralStatus,
    pub paid_at: Option<Timestamp>,

    /// Clearance anchor.
    pub created_at: Timestamp,
}

impl ReferralRecord {
    /// When the commission becomes eligible for payout.
    ///
    /// # Errors
    ///
    /// Returns an error if the clearance date overflows the supported range.
    pub fn cleared_at(&self) -> Result<Timestamp, jiff::Error> {
        clearance::cleared_at(self.created_at)
    }

    /// Pending and past its clearance date.
    #[must_use]
    pub fn is_cleared_pending(&self, now: Timestamp) -> bool {
        self.status == ReferralStatus::Pending && clearance::is_cleared(self.created_at, now)
    }

    /// Pending and still inside its clearance window.
    #[must_use]
    pub fn is_processing(&self, now: Timestamp) -> bool {
        self.status == ReferralStatus::Pending && !clearance::is_cleared(self.created_at, now)
    }
}
