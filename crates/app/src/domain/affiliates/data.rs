//! Affiliates Data

use crate::domain::{
    affiliates::records::{AffiliateRecord, AffiliateUuid},
    users::UserUuid,
};

/// Commission rate assigned to every new affiliate.
pub const DEFAULT_COMMISSION_RATE: u8 = 40;

/// New Affiliate Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewAffiliate {
    pub uuid: AffiliateUuid,
    pub user_uuid: UserUuid,
    pub referral_code: String,
    pub commission_rate: u8,
}

/// Outcome of registering a user as an affiliate.
///
/// Both variants are successes; re-registration hands back the existing
/// record untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(AffiliateRecord),
    AlreadyRegistered(AffiliateRecord),
}

impl Registration {
    #[must_use]
    pub fn affiliate(&self) -> &AffiliateRecord {
        match self {
            Self::Created(affiliate) | Self::AlreadyRegistered(affiliate) => affiliate,
        }
    }

    #[must_use]
    pub fn into_affiliate(self) -> AffiliateRecord {
        match self {
            Self::Created(affiliate) | Self::AlreadyRegistered(affiliate) => affiliate,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Hand-off to the payout provider's hosted onboarding flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingLink {
    pub destination_id: String,
    pub url: String,
}

/// Payout destination state as seen by the affiliate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingStatus {
    /// A destination has been created for the affiliate.
    pub connected: bool,

    /// The destination can receive transfers.
    pub onboarded: bool,

    pub destination_id: Option<String>,
}

impl OnboardingStatus {
    #[must_use]
    pub fn not_connected() -> Self {
        Self {
            connected: false,
            onboarded: false,
            destination_id: None,
        }
    }
}
