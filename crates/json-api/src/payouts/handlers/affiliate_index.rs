//! Affiliate Payout Requests Handler

use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use affiliates_app::domain::payouts::data::PayoutRequestFilter;

use crate::{
    affiliates,
    extensions::*,
    payouts::{errors::into_status_error, models::PayoutRequestsResponse},
};

/// Affiliate Payout Requests Handler
///
/// Returns the affiliate's payout requests, newest first.
#[endpoint(
    tags("payouts"),
    summary = "List Affiliate Payout Requests",
    responses(
        (status_code = StatusCode::OK, description = "Payout requests"),
        (status_code = StatusCode::NOT_FOUND, description = "User is not an affiliate"),
    ),
)]
pub(crate) async fn handler(
    user: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<PayoutRequestsResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let affiliate = state
        .app
        .affiliates
        .get_affiliate_by_user(user.into_inner().into())
        .await
        .map_err(affiliates::errors::into_status_error)?;

    let requests = state
        .app
        .payouts
        .list_payout_requests(PayoutRequestFilter::Affiliate(affiliate.uuid))
        .await
        .map_err(into_status_error)?;

    Ok(Json(requests.into()))
}
