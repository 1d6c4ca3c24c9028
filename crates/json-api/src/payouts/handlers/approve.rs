//! Approve Payout Request Handler

use jiff::Timestamp;
use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{
    extensions::*,
    observability::record_payout_decision,
    payouts::{errors::into_status_error, models::PayoutRequestResponse},
};

/// Approve Payout Request Handler
///
/// Transfers the quoted amount to the affiliate and settles the request.
/// Retrying after a failure never transfers twice.
#[endpoint(
    tags("admin"),
    summary = "Approve Payout Request",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Payout request paid"),
        (status_code = StatusCode::NOT_FOUND, description = "Payout request not found"),
        (status_code = StatusCode::CONFLICT, description = "Payout request already processed or no longer matches the ledger"),
        (status_code = StatusCode::BAD_GATEWAY, description = "Transfer failed"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Missing or invalid admin token"),
    ),
)]
pub(crate) async fn handler(
    request: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<PayoutRequestResponse>, StatusError> {
    let state = depot.state_or_500()?;

    match state
        .app
        .payouts
        .approve(request.into_inner().into(), Timestamp::now())
        .await
    {
        Ok(paid) => {
            record_payout_decision("approve", "paid");

            Ok(Json(paid.into()))
        }
        Err(error) => {
            record_payout_decision("approve", "failed");

            Err(into_status_error(error))
        }
    }
}
