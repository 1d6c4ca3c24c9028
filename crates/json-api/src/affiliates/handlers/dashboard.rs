//! Affiliate Dashboard Handler

use salvo::{
    oapi::{
        ToSchema,
        extract::{PathParam, QueryParam},
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use affiliates_app::domain::{
    payouts::data::MINIMUM_PAYOUT_AMOUNT,
    referrals::{
        data::{Balances, Dashboard},
        records::ReferralRecord,
    },
};

use crate::{
    affiliates::{errors::ledger_status_error, models::AffiliateResponse},
    extensions::*,
    state::State,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct BalancesResponse {
    /// Cleared and requestable now, in cents
    pub cleared: u64,

    /// Still inside the clearance window, in cents
    pub processing: u64,

    /// Settled through payouts, in cents
    pub paid: u64,

    /// Everything ever earned, in cents
    pub earned: u64,
}

impl From<Balances> for BalancesResponse {
    fn from(balances: Balances) -> Self {
        Self {
            cleared: balances.cleared,
            processing: balances.processing,
            paid: balances.paid,
            earned: balances.earned,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReferralResponse {
    pub uuid: Uuid,

    /// Gross subscription charge, in cents
    pub charge_amount: u64,

    /// Affiliate's share of the charge, in cents
    pub commission_amount: u64,

    /// `pending` or `paid`
    pub status: String,

    /// The date and time the commission was recorded
    pub created_at: String,

    /// The date and time the commission becomes payable
    pub cleared_at: Option<String>,

    /// The date and time the commission was paid out
    pub paid_at: Option<String>,
}

impl From<ReferralRecord> for ReferralResponse {
    fn from(referral: ReferralRecord) -> Self {
        Self {
            uuid: referral.uuid.into(),
            charge_amount: referral.charge_amount,
            commission_amount: referral.commission_amount,
            status: referral.status.to_string(),
            cleared_at: referral.cleared_at().ok().map(|at| at.to_string()),
            created_at: referral.created_at.to_string(),
            paid_at: referral.paid_at.map(|at| at.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct DashboardResponse {
    pub affiliate: AffiliateResponse,
    pub balances: BalancesResponse,

    /// Smallest cleared balance that can be requested, in cents
    pub minimum_payout: u64,

    /// Whether a payout request would currently be accepted
    pub can_request_payout: bool,

    /// The request awaiting review, if any
    pub pending_payout_request: Option<Uuid>,

    /// Newest first
    pub recent_referrals: Vec<ReferralResponse>,
}

impl DashboardResponse {
    fn new(dashboard: Dashboard, state: &State) -> Self {
        let can_request_payout = dashboard.affiliate.can_receive_payouts()
            && dashboard.pending_payout_request.is_none()
            && dashboard.balances.cleared >= MINIMUM_PAYOUT_AMOUNT;

        Self {
            affiliate: AffiliateResponse::new(dashboard.affiliate, state),
            balances: dashboard.balances.into(),
            minimum_payout: MINIMUM_PAYOUT_AMOUNT,
            can_request_payout,
            pending_payout_request: dashboard.pending_payout_request.map(Into::into),
            recent_referrals: dashboard
                .recent_referrals
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

/// Affiliate Dashboard Handler
///
/// Returns the affiliate's code, balances and most recent referrals.
#[endpoint(
    tags("affiliates"),
    summary = "Affiliate Dashboard",
    responses(
        (status_code = StatusCode::OK, description = "Dashboard"),
        (status_code = StatusCode::NOT_FOUND, description = "User is not an affiliate"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
    ),
)]
pub(crate) async fn handler(
    user: PathParam<Uuid>,
    at: QueryParam<String, false>,
    depot: &mut Depot,
) -> Result<Json<DashboardResponse>, StatusError> {
    let state = depot.state_or_500()?;
    let now = at.into_inner().timestamp_or_now("at")?;

    let dashboard = state
        .app
        .referrals
        .dashboard(user.into_inner().into(), now)
        .await
        .map_err(ledger_status_error)?;

    Ok(Json(DashboardResponse::new(dashboard, state)))
}
