//! Reject Payout Request Handler

use jiff::Timestamp;
use salvo::{
    oapi::{
        ToSchema,
        extract::{JsonBody, PathParam},
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    extensions::*,
    observability::record_payout_decision,
    payouts::{errors::into_status_error, models::PayoutRequestResponse},
};

/// Reject Payout Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct RejectPayoutRequest {
    /// Shown to the affiliate
    pub reason: String,
}

/// Reject Payout Request Handler
///
/// Closes a pending request without paying it. Its commissions stay pending
/// and can be requested again.
#[endpoint(
    tags("admin"),
    summary = "Reject Payout Request",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Payout request rejected"),
        (status_code = StatusCode::NOT_FOUND, description = "Payout request not found"),
        (status_code = StatusCode::CONFLICT, description = "Payout request already processed or being approved"),
        (status_code = StatusCode::UNPROCESSABLE_ENTITY, description = "Missing rejection reason"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Missing or invalid admin token"),
    ),
)]
pub(crate) async fn handler(
    request: PathParam<Uuid>,
    json: JsonBody<RejectPayoutRequest>,
    depot: &mut Depot,
) -> Result<Json<PayoutRequestResponse>, StatusError> {
    let state = depot.state_or_500()?;

    match state
        .app
        .payouts
        .reject(
            request.into_inner().into(),
            json.into_inner().reason,
            Timestamp::now(),
        )
        .await
    {
        Ok(rejected) => {
            record_payout_decision("reject", "rejected");

            Ok(Json(rejected.into()))
        }
        Err(error) => {
            record_payout_decision("reject", "failed");

            Err(into_status_error(error))
        }
    }
}
