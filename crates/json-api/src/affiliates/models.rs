//! Affiliate response models.

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use affiliates_app::domain::{affiliates::records::AffiliateRecord, referrals::data::LedgerTotals};

use crate::state::State;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct AffiliateResponse {
    /// The unique identifier of the affiliate
    pub uuid: Uuid,

    /// The user enrolled as this affiliate
    pub user_uuid: Uuid,

    /// Shareable referral code
    pub referral_code: String,

    /// Sign-up link carrying the referral code
    pub referral_link: String,

    /// Whole percentage of each referred charge paid as commission
    pub commission_rate: u8,

    /// Whether the payout destination can receive transfers
    pub payout_onboarded: bool,

    /// Whether the referral code still attributes new referrals
    pub is_active: bool,

    /// Sum of all commissions, in cents
    pub total_earned: u64,

    /// Sum of settled payouts, in cents
    pub total_paid: u64,

    /// Number of referrals
    pub referral_count: u64,

    /// The date and time the affiliate registered
    pub created_at: String,
}

impl AffiliateResponse {
    pub(crate) fn new(affiliate: AffiliateRecord, state: &State) -> Self {
        Self {
            referral_link: state.referral_link(&affiliate.referral_code),
            uuid: affiliate.uuid.into(),
            user_uuid: affiliate.user_uuid.into(),
            referral_code: affiliate.referral_code,
            commission_rate: affiliate.commission_rate,
            payout_onboarded: affiliate.payout_onboarded,
            is_active: affiliate.is_active,
            total_earned: affiliate.total_earned,
            total_paid: affiliate.total_paid,
            referral_count: affiliate.referral_count,
            created_at: affiliate.created_at.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub(crate) struct TotalsResponse {
    /// Sum of all commissions, in cents
    pub earned: u64,

    /// Sum of paid commissions, in cents
    pub paid: u64,

    pub referral_count: u64,
}

impl From<LedgerTotals> for TotalsResponse {
    fn from(totals: LedgerTotals) -> Self {
        Self {
            earned: totals.earned,
            paid: totals.paid,
            referral_count: totals.referral_count,
        }
    }
}
