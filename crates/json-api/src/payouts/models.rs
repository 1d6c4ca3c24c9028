//! Payout response models.

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use affiliates_app::domain::payouts::{data::format_dollars, records::PayoutRequestRecord};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PayoutRequestResponse {
    pub uuid: Uuid,
    pub affiliate_uuid: Uuid,

    /// Quoted cleared balance, in cents
    pub amount: u64,

    /// Quoted cleared balance, formatted as dollars
    pub amount_display: String,

    /// `pending`, `paid` or `rejected`
    pub status: String,

    pub rejection_reason: Option<String>,

    /// Payout provider transfer id
    pub transfer_reference: Option<String>,

    pub requested_at: String,
    pub settled_at: Option<String>,
    pub rejected_at: Option<String>,
}

impl From<PayoutRequestRecord> for PayoutRequestResponse {
    fn from(request: PayoutRequestRecord) -> Self {
        Self {
            uuid: request.uuid.into(),
            affiliate_uuid: request.affiliate_uuid.into(),
            amount: request.amount,
            amount_display: format_dollars(request.amount),
            status: request.status.to_string(),
            rejection_reason: request.rejection_reason,
            transfer_reference: request.transfer_reference,
            requested_at: request.requested_at.to_string(),
            settled_at: request.settled_at.map(|at| at.to_string()),
            rejected_at: request.rejected_at.map(|at| at.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PayoutRequestsResponse {
    pub payout_requests: Vec<PayoutRequestResponse>,
}

impl From<Vec<PayoutRequestRecord>> for PayoutRequestsResponse {
    fn from(requests: Vec<PayoutRequestRecord>) -> Self {
        Self {
            payout_requests: requests.into_iter().map(Into::into).collect(),
        }
    }
}
