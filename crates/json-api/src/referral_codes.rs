//! Referral Code Validation Handler

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::extensions::*;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReferralCodeResponse {
    /// The code as entered
    pub code: String,

    /// Whether the code belongs to an active affiliate
    pub valid: bool,
}

/// Referral Code Validation Handler
///
/// Checks a code entered at sign-up. Matching is case-insensitive.
#[endpoint(tags("referral-codes"), summary = "Validate Referral Code")]
pub(crate) async fn handler(
    code: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<ReferralCodeResponse>, StatusError> {
    let state = depot.state_or_500()?;
    let code = code.into_inner();

    let valid = state.app.affiliates.validate_code(&code).await;

    Ok(Json(ReferralCodeResponse { code, valid }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use crate::test_helpers::{Mocks, service};

    use super::*;

    fn make_service(mocks: Mocks) -> Service {
        service(mocks, Router::with_path("referral-codes/{code}").get(handler))
    }

    #[tokio::test]
    async fn active_code_is_valid() -> TestResult {
        let mut mocks = Mocks::default();

        mocks
            .affiliates
            .expect_validate_code()
            .once()
            .withf(|code| code.eq_ignore_ascii_case("pro4x7k2"))
            .return_const(true);

        let body: ReferralCodeResponse =
            TestClient::get("http://example.com/referral-codes/pro4x7k2")
                .send(&make_service(mocks))
                .await
                .take_json()
                .await?;

        assert!(body.valid);
        assert_eq!(body.code, "pro4x7k2");

        Ok(())
    }

    #[tokio::test]
    async fn unknown_code_is_invalid() -> TestResult {
        let mut mocks = Mocks::default();

        mocks.affiliates.expect_validate_code().once().return_const(false);

        let mut res = TestClient::get("http://example.com/referral-codes/NOPE1234")
            .send(&make_service(mocks))
            .await;

        let body: ReferralCodeResponse = res.take_json().await?;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert!(!body.valid);

        Ok(())
    }
}
