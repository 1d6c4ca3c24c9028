//! Payout destination provider boundary.
//!
//! Affiliates are paid through an external provider that owns the connected
//! payout accounts ("destinations") and moves funds into them. Services only
//! see the [`PayoutProvider`] trait; [`StripeConnectClient`] is the production
//! implementation.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::{
    affiliates::records::AffiliateUuid, payouts::records::PayoutRequestUuid, users::UserUuid,
};

mod stripe;

pub use stripe::{StripeConfig, StripeConnectClient};

/// Capability flags reported for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DestinationStatus {
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl DestinationStatus {
    /// Whether the destination has finished onboarding and can receive transfers.
    #[must_use]
    pub fn is_onboarded(&self) -> bool {
        self.charges_enabled && self.payouts_enabled
    }
}

/// Funds movement into an affiliate's destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub destination_id: String,

    /// Amount in cents.
    pub amount: u64,

    /// Retrying with the same key never moves funds twice.
    pub idempotency_key: String,

    pub affiliate: AffiliateUuid,
    pub payout_request: PayoutRequestUuid,
}

/// Provider acknowledgement of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub reference: String,
}

#[derive(Debug, Error)]
pub enum PayoutProviderError {
    /// Transport failure. The provider may or may not have acted on the call.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered and refused the call.
    #[error("unexpected response from payout provider: {0}")]
    UnexpectedResponse(String),
}

impl PayoutProviderError {
    /// Whether the provider is known not to have acted on the call.
    #[must_use]
    pub fn is_definite_failure(&self) -> bool {
        matches!(self, Self::UnexpectedResponse(_))
    }
}

#[automock]
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Create a payout destination for the affiliate, returning its id.
    async fn create_destination(
        &self,
        affiliate: AffiliateUuid,
        user: UserUuid,
    ) -> Result<String, PayoutProviderError>;

    /// Current capability flags of a destination.
    async fn destination_status(
        &self,
        destination_id: &str,
    ) -> Result<DestinationStatus, PayoutProviderError>;

    /// A fresh hosted onboarding URL for the destination.
    async fn create_onboarding_link(
        &self,
        destination_id: &str,
    ) -> Result<String, PayoutProviderError>;

    /// Move funds into a destination.
    async fn transfer(
        &self,
        transfer: &TransferRequest,
    ) -> Result<TransferReceipt, PayoutProviderError>;
}
