//! Deactivate Affiliate Handler

use salvo::{oapi::extract::PathParam, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{
    affiliates::{errors::into_status_error, models::AffiliateResponse},
    extensions::*,
};

/// Deactivate Affiliate Handler
///
/// Stops the affiliate's code from attributing new referrals. History and
/// balances are kept.
#[endpoint(
    tags("admin"),
    summary = "Deactivate Affiliate",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Affiliate deactivated"),
        (status_code = StatusCode::NOT_FOUND, description = "Affiliate not found"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Missing or invalid admin token"),
    ),
)]
pub(crate) async fn handler(
    affiliate: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<AffiliateResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let affiliate = state
        .app
        .affiliates
        .deactivate(affiliate.into_inner().into())
        .await
        .map_err(into_status_error)?;

    info!(affiliate = %affiliate.uuid, "affiliate deactivated by admin");

    Ok(Json(AffiliateResponse::new(affiliate, state)))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use affiliates_app::domain::{affiliates::AffiliatesServiceError, users::UserUuid};

    use crate::test_helpers::{Mocks, make_affiliate, service};

    use super::*;

    fn make_service(mocks: Mocks) -> Service {
        service(
            mocks,
            Router::with_path("admin/affiliates/{affiliate}/deactivate").post(handler),
        )
    }

    #[tokio::test]
    async fn deactivated_affiliate_is_returned() -> TestResult {
        let mut affiliate = make_affiliate(UserUuid::new());
        affiliate.is_active = false;

        let uuid = affiliate.uuid;
        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_deactivate()
            .once()
            .withf(move |a| *a == uuid)
            .return_once(move |_| Ok(affiliate));

        let body: AffiliateResponse = TestClient::post(format!(
            "http://example.com/admin/affiliates/{uuid}/deactivate"
        ))
        .send(&make_service(mocks))
        .await
        .take_json()
        .await?;

        assert!(!body.is_active);
        assert_eq!(body.uuid, uuid.into_uuid());

        Ok(())
    }

    #[tokio::test]
    async fn unknown_affiliate_returns_404() {
        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_deactivate()
            .once()
            .return_once(|_| Err(AffiliatesServiceError::NotFound));

        let res = TestClient::post(format!(
            "http://example.com/admin/affiliates/{}/deactivate",
            Uuid::now_v7()
        ))
        .send(&make_service(mocks))
        .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));
    }
}
