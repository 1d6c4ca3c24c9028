//! Payouts Data

use jiff::Timestamp;

use crate::domain::{
    affiliates::records::AffiliateUuid,
    payouts::records::{PayoutRequestUuid, PayoutStatus},
};

/// Smallest cleared balance that can be requested, in cents.
pub const MINIMUM_PAYOUT_AMOUNT: u64 = 1000;

/// New Payout Request Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayoutRequest {
    pub uuid: PayoutRequestUuid,
    pub affiliate_uuid: AffiliateUuid,
    pub amount: u64,
    pub requested_at: Timestamp,
}

/// Which payout requests to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutRequestFilter {
    /// Every request in a state, oldest first.
    Status(PayoutStatus),

    /// One affiliate's requests, newest first.
    Affiliate(AffiliateUuid),
}

/// Render cents as dollars, e.g. `999` as `"$9.99"`.
#[must_use]
pub fn format_dollars(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}
