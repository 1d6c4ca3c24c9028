//! Request Payout Handler

use jiff::Timestamp;
use salvo::{http::header::LOCATION, oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{
    affiliates,
    extensions::*,
    payouts::{errors::into_status_error, models::PayoutRequestResponse},
};

/// Request Payout Handler
///
/// Opens a payout request for the affiliate's whole cleared balance.
#[endpoint(
    tags("payouts"),
    summary = "Request Payout",
    responses(
        (status_code = StatusCode::CREATED, description = "Payout requested"),
        (status_code = StatusCode::NOT_FOUND, description = "User is not an affiliate"),
        (status_code = StatusCode::CONFLICT, description = "A payout request is already pending"),
        (status_code = StatusCode::UNPROCESSABLE_ENTITY, description = "Not onboarded or not enough cleared earnings"),
    ),
)]
pub(crate) async fn handler(
    user: PathParam<Uuid>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<PayoutRequestResponse>, StatusError> {
    let state = depot.state_or_500()?;

    let affiliate = state
        .app
        .affiliates
        .get_affiliate_by_user(user.into_inner().into())
        .await
        .map_err(affiliates::errors::into_status_error)?;

    let request = state
        .app
        .payouts
        .request_payout(affiliate.uuid, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    res.add_header(LOCATION, format!("/admin/payouts/{}", request.uuid), true)
        .or_500("failed to set location header")?
        .status_code(StatusCode::CREATED);

    Ok(Json(request.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use affiliates_app::domain::{payouts::PayoutsServiceError, users::UserUuid};

    use crate::test_helpers::{Mocks, make_affiliate, make_payout_request, service};

    use super::*;

    fn make_service(mocks: Mocks) -> Service {
        service(mocks, Router::with_path("affiliates/{user}/payouts").post(handler))
    }

    fn mocks_for(user: UserUuid, result: Result<u64, PayoutsServiceError>) -> Mocks {
        let affiliate = make_affiliate(user);
        let uuid = affiliate.uuid;
        let request = result.map(|amount| make_payout_request(&affiliate, amount));

        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_get_affiliate_by_user()
            .once()
            .return_once(move |_| Ok(affiliate));

        mocks
            .payouts
            .expect_request_payout()
            .once()
            .withf(move |a, _| *a == uuid)
            .return_once(move |_, _| request);

        mocks
    }

    #[tokio::test]
    async fn cleared_balance_is_requested() -> TestResult {
        let user = UserUuid::new();

        let mut res = TestClient::post(format!("http://example.com/affiliates/{user}/payouts"))
            .send(&make_service(mocks_for(user, Ok(1960))))
            .await;

        let body: PayoutRequestResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::CREATED));
        assert_eq!(body.amount, 1960);
        assert_eq!(body.amount_display, "$19.60");
        assert_eq!(body.status, "pending");

        Ok(())
    }

    #[tokio::test]
    async fn below_minimum_returns_422_with_message() -> TestResult {
        let user = UserUuid::new();

        let mut res = TestClient::post(format!("http://example.com/affiliates/{user}/payouts"))
            .send(&make_service(mocks_for(
                user,
                Err(PayoutsServiceError::BelowMinimum {
                    cleared: 999,
                    minimum: 1000,
                }),
            )))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(
            res.take_string()
                .await?
                .contains("minimum payout is $10.00; cleared earnings are $9.99")
        );

        Ok(())
    }

    #[tokio::test]
    async fn pending_request_returns_409() {
        let user = UserUuid::new();

        let res = TestClient::post(format!("http://example.com/affiliates/{user}/payouts"))
            .send(&make_service(mocks_for(
                user,
                Err(PayoutsServiceError::RequestAlreadyPending),
            )))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn not_onboarded_returns_422() {
        let user = UserUuid::new();

        let res = TestClient::post(format!("http://example.com/affiliates/{user}/payouts"))
            .send(&make_service(mocks_for(user, Err(PayoutsServiceError::NotOnboarded))))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNPROCESSABLE_ENTITY));
    }
}
