//! Attribution Data

use jiff::Timestamp;

use crate::domain::{
    affiliates::records::AffiliateUuid, referrals::records::ReferralRecord, users::UserUuid,
};

/// Currency every commission and payout is denominated in.
pub const LEDGER_CURRENCY: &str = "usd";

/// A paid subscription became active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionActivated {
    /// Billing provider charge id; attribution happens at most once per id.
    pub subscription_charge_id: String,

    pub payer_user: UserUuid,

    /// Charged amount, in cents.
    pub charge_amount: u64,

    /// ISO currency code as reported by billing.
    pub currency: String,

    /// Code the payer signed up with, as entered.
    pub referred_by_code: Option<String>,

    /// When billing says the charge happened. Deliveries may be late, so
    /// clearance counts from attribution instead.
    pub occurred_at: Timestamp,
}

/// What happened to a subscription activation.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// The payer was not referred.
    NoReferralCode,

    /// The code does not belong to an active affiliate.
    UnknownCode { code: String },

    /// The payer used their own code.
    SelfReferral { affiliate_uuid: AffiliateUuid },

    /// The charge is not in the ledger currency.
    UnsupportedCurrency { currency: String },

    /// The charge was attributed by an earlier delivery of the same event.
    AlreadyRecorded { subscription_charge_id: String },

    /// A commission was appended to the ledger.
    Recorded(ReferralRecord),
}

impl Attribution {
    /// Short machine-readable name of the outcome.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoReferralCode => "no_referral_code",
            Self::UnknownCode { .. } => "unknown_code",
            Self::SelfReferral { .. } => "self_referral",
            Self::UnsupportedCurrency { .. } => "unsupported_currency",
            Self::AlreadyRecorded { .. } => "already_recorded",
            Self::Recorded(_) => "recorded",
        }
    }
}
