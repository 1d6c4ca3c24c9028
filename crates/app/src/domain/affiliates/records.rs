//! Affiliate Records

use jiff::Timestamp;

use crate::{domain::users::UserUuid, uuids::TypedUuid};

/// Affiliate UUID
pub type AffiliateUuid = TypedUuid<AffiliateRecord>;

/// Affiliate Record
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliateRecord {
    pub uuid: AffiliateUuid,

    /// The user enrolled as this affiliate. One affiliate per user.
    pub user_uuid: UserUuid,

    /// Upper-case, shareable code. Never changes once assigned.
    pub referral_code: String,

    /// Whole percentage of each referred charge paid as commission.
    pub commission_rate: u8,

    /// External payout account, stored before onboarding completes.
    pub payout_destination_id: Option<String>,

    /// Set once the payout destination can receive transfers.
    pub payout_onboarded: bool,

    /// Inactive affiliates keep their history but their code stops attributing.
    pub is_active: bool,

    /// Cached sum of all commissions, in cents.
    pub total_earned: u64,

    /// Cached sum of settled payouts, in cents.
    pub total_paid: u64,

    /// Cached number of referrals.
    pub referral_count: u64,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AffiliateRecord {
    /// Whether payouts may be requested against this affiliate.
    #[must_use]
    pub fn can_receive_payouts(&self) -> bool {
        self.payout_onboarded && self.payout_destination_id.is_some()
    }
}
