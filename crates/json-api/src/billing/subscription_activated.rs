//! Subscription Activated Handler

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use affiliates_app::domain::attribution::{
    AttributionServiceError,
    data::{Attribution, SubscriptionActivated},
};

use crate::{extensions::*, observability::record_attribution};

/// Subscription Activated Event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SubscriptionActivatedEvent {
    /// Billing charge id; redelivering the same id records nothing new
    pub subscription_charge_id: String,

    /// The paying user
    pub payer_user_uuid: Uuid,

    /// Charged amount, in cents
    pub charge_amount: u64,

    /// ISO currency code
    pub currency: String,

    /// Referral code the payer signed up with, if any
    pub referred_by_code: Option<String>,

    /// When the charge happened, RFC 3339. Defaults to receipt time.
    pub occurred_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct AttributionResponse {
    /// `recorded`, `already_recorded`, `no_referral_code`, `unknown_code`,
    /// `self_referral` or `unsupported_currency`
    pub outcome: String,

    /// The commission appended to the ledger, when one was
    pub referral_uuid: Option<Uuid>,

    /// Commission credited to the affiliate, in cents
    pub commission_amount: Option<u64>,
}

impl From<Attribution> for AttributionResponse {
    fn from(attribution: Attribution) -> Self {
        let outcome = attribution.kind().to_string();

        match attribution {
            Attribution::Recorded(referral) => Self {
                outcome,
                referral_uuid: Some(referral.uuid.into()),
                commission_amount: Some(referral.commission_amount),
            },
            _ => Self {
                outcome,
                referral_uuid: None,
                commission_amount: None,
            },
        }
    }
}

/// Subscription Activated Handler
///
/// Attributes a paid subscription to the affiliate whose code the payer
/// used. Every outcome other than a storage failure is acknowledged with 200
/// so the billing provider stops redelivering.
#[endpoint(
    tags("billing"),
    summary = "Subscription Activated",
    responses(
        (status_code = StatusCode::OK, description = "Event handled"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Retry later"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<SubscriptionActivatedEvent>,
    depot: &mut Depot,
) -> Result<Json<AttributionResponse>, StatusError> {
    let state = depot.state_or_500()?;
    let event = json.into_inner();

    let occurred_at = event.occurred_at.timestamp_or_now("occurred_at")?;

    let attribution = state
        .app
        .attribution
        .subscription_activated(SubscriptionActivated {
            subscription_charge_id: event.subscription_charge_id,
            payer_user: event.payer_user_uuid.into(),
            charge_amount: event.charge_amount,
            currency: event.currency,
            referred_by_code: event.referred_by_code,
            occurred_at,
        })
        .await
        .map_err(|error| {
            record_attribution("failed");
            into_status_error(error)
        })?;

    record_attribution(attribution.kind());

    Ok(Json(attribution.into()))
}

fn into_status_error(error: AttributionServiceError) -> StatusError {
    error!("failed to attribute subscription activation: {error}");

    StatusError::internal_server_error()
}
