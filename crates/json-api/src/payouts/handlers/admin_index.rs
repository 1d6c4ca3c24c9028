//! Admin Payout Requests Handler

use salvo::{oapi::extract::QueryParam, prelude::*};

use affiliates_app::domain::payouts::{data::PayoutRequestFilter, records::PayoutStatus};

use crate::{
    extensions::*,
    payouts::{errors::into_status_error, models::PayoutRequestsResponse},
};

/// Admin Payout Requests Handler
///
/// Returns payout requests in a status, oldest first. Defaults to pending.
#[endpoint(
    tags("admin"),
    summary = "List Payout Requests",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Payout requests"),
        (status_code = StatusCode::BAD_REQUEST, description = "Unknown status"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Missing or invalid admin token"),
    ),
)]
pub(crate) async fn handler(
    status: QueryParam<String, false>,
    depot: &mut Depot,
) -> Result<Json<PayoutRequestsResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let status = status
        .into_inner()
        .map(|value| value.parse::<PayoutStatus>())
        .transpose()
        .or_400("could not parse \"status\" query parameter")?
        .unwrap_or(PayoutStatus::Pending);

    let requests = state
        .app
        .payouts
        .list_payout_requests(PayoutRequestFilter::Status(status))
        .await
        .map_err(into_status_error)?;

    Ok(Json(requests.into()))
}
