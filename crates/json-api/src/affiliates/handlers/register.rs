//! Register Affiliate Handler

use salvo::{
    http::header::LOCATION,
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    affiliates::{errors::into_status_error, models::AffiliateResponse},
    extensions::*,
};

/// Register Affiliate Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct RegisterAffiliateRequest {
    /// The user enrolling as an affiliate
    pub user_uuid: Uuid,
}

/// Register Affiliate Handler
///
/// Enrols the user, or returns their existing enrolment unchanged.
#[endpoint(
    tags("affiliates"),
    summary = "Register Affiliate",
    responses(
        (status_code = StatusCode::CREATED, description = "Affiliate registered"),
        (status_code = StatusCode::OK, description = "User was already an affiliate"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<RegisterAffiliateRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<AffiliateResponse>, StatusError> {
    let state = depot.state_or_500()?;
    let user = json.into_inner().user_uuid;

    let registration = state
        .app
        .affiliates
        .register(user.into())
        .await
        .map_err(into_status_error)?;

    if registration.is_new() {
        res.add_header(LOCATION, format!("/affiliates/{user}/dashboard"), true)
            .or_500("failed to set location header")?
            .status_code(StatusCode::CREATED);
    }

    Ok(Json(AffiliateResponse::new(
        registration.into_affiliate(),
        state,
    )))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;

    use affiliates_app::domain::{
        affiliates::{AffiliatesServiceError, data::Registration},
        users::UserUuid,
    };

    use crate::test_helpers::{Mocks, make_affiliate, service};

    use super::*;

    fn make_service(mocks: Mocks) -> Service {
        service(mocks, Router::with_path("affiliates").post(handler))
    }

    #[tokio::test]
    async fn new_affiliate_returns_201_with_referral_link() -> TestResult {
        let user = UserUuid::new();
        let affiliate = make_affiliate(user);

        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_register()
            .once()
            .withf(move |u| *u == user)
            .return_once(move |_| Ok(Registration::Created(affiliate)));

        let mut res = TestClient::post("http://example.com/affiliates")
            .json(&json!({ "user_uuid": user.into_uuid() }))
            .send(&make_service(mocks))
            .await;

        let body: AffiliateResponse = res.take_json().await?;
        let location = res.headers().get("location").and_then(|v| v.to_str().ok());

        assert_eq!(res.status_code, Some(StatusCode::CREATED));
        assert_eq!(location, Some(format!("/affiliates/{user}/dashboard").as_str()));
        assert_eq!(body.referral_code, "PRO4X7K2");
        assert_eq!(body.commission_rate, 40);
        assert_eq!(
            body.referral_link,
            "https://affiliates.test/signup?ref=PRO4X7K2"
        );

        Ok(())
    }

    #[tokio::test]
    async fn existing_affiliate_returns_200() -> TestResult {
        let user = UserUuid::new();
        let affiliate = make_affiliate(user);

        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_register()
            .once()
            .return_once(move |_| Ok(Registration::AlreadyRegistered(affiliate)));

        let mut res = TestClient::post("http://example.com/affiliates")
            .json(&json!({ "user_uuid": user.into_uuid() }))
            .send(&make_service(mocks))
            .await;

        let body: AffiliateResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert!(res.headers().get("location").is_none());
        assert_eq!(body.user_uuid, user.into_uuid());

        Ok(())
    }

    #[tokio::test]
    async fn code_exhaustion_returns_500() {
        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_register()
            .once()
            .return_once(|_| Err(AffiliatesServiceError::CodeGenerationExhausted { attempts: 5 }));

        let res = TestClient::post("http://example.com/affiliates")
            .json(&json!({ "user_uuid": UserUuid::new().into_uuid() }))
            .send(&make_service(mocks))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let res = TestClient::post("http://example.com/affiliates")
            .json(&json!({ "user_uuid": "not-a-uuid" }))
            .send(&make_service(Mocks::default()))
            .await;

        assert_eq!(res.status_code.map(|status| status.is_client_error()), Some(true));
    }
}
