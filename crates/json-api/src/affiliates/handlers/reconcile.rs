//! Reconcile Affiliate Aggregates Handler

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use affiliates_app::domain::referrals::data::Reconciliation;

use crate::{
    affiliates::{errors::ledger_status_error, models::TotalsResponse},
    extensions::*,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReconciliationResponse {
    pub affiliate_uuid: Uuid,

    /// Counters as they were cached on the affiliate
    pub cached: TotalsResponse,

    /// Counters re-derived from the ledger, now cached on the affiliate
    pub ledger: TotalsResponse,

    /// Whether the cached counters had to be corrected
    pub drifted: bool,
}

impl From<Reconciliation> for ReconciliationResponse {
    fn from(reconciliation: Reconciliation) -> Self {
        Self {
            drifted: reconciliation.drifted(),
            affiliate_uuid: reconciliation.affiliate_uuid.into(),
            cached: reconciliation.cached.into(),
            ledger: reconciliation.ledger.into(),
        }
    }
}

/// Reconcile Affiliate Handler
///
/// Re-derives the affiliate's cached totals from the ledger and overwrites
/// them when they differ.
#[endpoint(
    tags("admin"),
    summary = "Reconcile Affiliate Aggregates",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Aggregates reconciled"),
        (status_code = StatusCode::NOT_FOUND, description = "Affiliate not found"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Missing or invalid admin token"),
    ),
)]
pub(crate) async fn handler(
    affiliate: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<ReconciliationResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let reconciliation = state
        .app
        .referrals
        .reconcile_aggregates(affiliate.into_inner().into())
        .await
        .map_err(ledger_status_error)?;

    Ok(Json(reconciliation.into()))
}
