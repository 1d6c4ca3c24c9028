//! Payout Destination Handlers

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use affiliates_app::domain::affiliates::data::{OnboardingLink, OnboardingStatus};

use crate::{affiliates::errors::into_status_error, extensions::*};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OnboardingLinkResponse {
    /// Payout destination the link onboards
    pub destination_id: String,

    /// Single-use hosted onboarding URL
    pub url: String,
}

impl From<OnboardingLink> for OnboardingLinkResponse {
    fn from(onboarding_link: OnboardingLink) -> Self {
        Self {
            destination_id: onboarding_link.destination_id,
            url: onboarding_link.url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OnboardingStatusResponse {
    /// A payout destination exists
    pub connected: bool,

    /// The payout destination can receive transfers
    pub onboarded: bool,

    pub destination_id: Option<String>,
}

impl From<OnboardingStatus> for OnboardingStatusResponse {
    fn from(onboarding: OnboardingStatus) -> Self {
        Self {
            connected: onboarding.connected,
            onboarded: onboarding.onboarded,
            destination_id: onboarding.destination_id,
        }
    }
}

/// Link Payout Destination Handler
///
/// Creates the affiliate's payout destination on first use and returns a
/// fresh onboarding link for it.
#[endpoint(
    tags("affiliates"),
    summary = "Link Payout Destination",
    responses(
        (status_code = StatusCode::OK, description = "Onboarding link"),
        (status_code = StatusCode::NOT_FOUND, description = "User is not an affiliate"),
        (status_code = StatusCode::BAD_GATEWAY, description = "Payout provider failed"),
    ),
)]
pub(crate) async fn link(
    user: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<OnboardingLinkResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let affiliate = state
        .app
        .affiliates
        .get_affiliate_by_user(user.into_inner().into())
        .await
        .map_err(into_status_error)?;

    let onboarding_link = state
        .app
        .affiliates
        .link_payout_destination(affiliate.uuid)
        .await
        .map_err(into_status_error)?;

    Ok(Json(onboarding_link.into()))
}

/// Payout Destination Status Handler
///
/// Refreshes onboarding state from the payout provider.
#[endpoint(
    tags("affiliates"),
    summary = "Payout Destination Status",
    responses(
        (status_code = StatusCode::OK, description = "Onboarding status"),
        (status_code = StatusCode::NOT_FOUND, description = "User is not an affiliate"),
        (status_code = StatusCode::BAD_GATEWAY, description = "Payout provider failed"),
    ),
)]
pub(crate) async fn status(
    user: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<OnboardingStatusResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let affiliate = state
        .app
        .affiliates
        .get_affiliate_by_user(user.into_inner().into())
        .await
        .map_err(into_status_error)?;

    let onboarding = state
        .app
        .affiliates
        .confirm_onboarding(affiliate.uuid)
        .await
        .map_err(into_status_error)?;

    Ok(Json(onboarding.into()))
}
