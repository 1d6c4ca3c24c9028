//! Payout Request Records

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{UnknownStatus, affiliates::records::AffiliateUuid},
    uuids::TypedUuid,
};

/// Payout Request UUID
pub type PayoutRequestUuid = TypedUuid<PayoutRequestRecord>;

/// `pending → paid` or `pending → rejected`. Terminal states never reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Rejected,
}

impl PayoutStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Payout Request Record
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRequestRecord {
    pub uuid: PayoutRequestUuid,
    pub affiliate_uuid: AffiliateUuid,

    /// Cleared balance quoted when the request was made, in cents.
    pub amount: u64,

    pub status: PayoutStatus,

    /// Present exactly when rejected.
    pub rejection_reason: Option<String>,

    /// Provider transfer id, recorded as soon as funds have moved.
    pub transfer_reference: Option<String>,

    /// Set while an approval is between its checks and its transfer.
    pub approval_started_at: Option<Timestamp>,

    /// Pins the settlement scope: only referrals cleared by this instant
    /// are paid by this request.
    pub requested_at: Timestamp,

    pub settled_at: Option<Timestamp>,
    pub rejected_at: Option<Timestamp>,
}
