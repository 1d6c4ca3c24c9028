//! Stripe Connect client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    domain::{affiliates::records::AffiliateUuid, users::UserUuid},
    payout_provider::{
        DestinationStatus, PayoutProvider, PayoutProviderError, TransferReceipt, TransferRequest,
    },
};

/// Configuration for the Stripe Connect API.
#[derive(Debug, Clone, clap::Args)]
pub struct StripeConfig {
    /// API root, e.g. `"https://api.stripe.com"`.
    #[arg(long = "stripe-api-base", env = "STRIPE_API_BASE", default_value = "https://api.stripe.com")]
    pub api_base: String,

    /// Secret API key, sent as a bearer token.
    #[arg(long = "stripe-secret-key", env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Lower-case ISO currency used for transfers.
    #[arg(long = "payout-currency", env = "PAYOUT_CURRENCY", default_value = "usd")]
    pub currency: String,

    /// Where Stripe sends affiliates whose onboarding link expired.
    #[arg(long = "onboarding-refresh-url", env = "ONBOARDING_REFRESH_URL")]
    pub refresh_url: String,

    /// Where Stripe sends affiliates after onboarding.
    #[arg(long = "onboarding-return-url", env = "ONBOARDING_RETURN_URL")]
    pub return_url: String,
}

/// HTTP client for Stripe Connect express accounts and transfers.
#[derive(Debug, Clone)]
pub struct StripeConnectClient {
    config: StripeConfig,
    http: Client,
}

impl StripeConnectClient {
    /// Create a new client from the given configuration.
    #[must_use]
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PayoutProviderError> {
        let mut request = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .form(form);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        parse_response(path, request.send().await?).await
    }
}

#[async_trait]
impl PayoutProvider for StripeConnectClient {
    #[tracing::instrument(name = "stripe.create_destination", skip(self), err)]
    async fn create_destination(
        &self,
        affiliate: AffiliateUuid,
        user: UserUuid,
    ) -> Result<String, PayoutProviderError> {
        let account: StripeObject = self
            .post_form("accounts", &account_form(affiliate, user), None)
            .await?;

        Ok(account.id)
    }

    #[tracing::instrument(name = "stripe.destination_status", skip(self), err)]
    async fn destination_status(
        &self,
        destination_id: &str,
    ) -> Result<DestinationStatus, PayoutProviderError> {
        let path = format!("accounts/{destination_id}");

        let response = self
            .http
            .get(self.url(&path))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let account: StripeAccount = parse_response(&path, response).await?;

        Ok(DestinationStatus {
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
        })
    }

    #[tracing::instrument(name = "stripe.create_onboarding_link", skip(self), err)]
    async fn create_onboarding_link(
        &self,
        destination_id: &str,
    ) -> Result<String, PayoutProviderError> {
        let link: StripeAccountLink = self
            .post_form(
                "account_links",
                &account_link_form(&self.config, destination_id),
                None,
            )
            .await?;

        Ok(link.url)
    }

    #[tracing::instrument(
        name = "stripe.transfer",
        skip(self, transfer),
        fields(
            payout_request = %transfer.payout_request,
            amount = transfer.amount,
        ),
        err
    )]
    async fn transfer(
        &self,
        transfer: &TransferRequest,
    ) -> Result<TransferReceipt, PayoutProviderError> {
        let created: StripeObject = self
            .post_form(
                "transfers",
                &transfer_form(&self.config.currency, transfer),
                Some(&transfer.idempotency_key),
            )
            .await?;

        Ok(TransferReceipt {
            reference: created.id,
        })
    }
}

async fn parse_response<T: DeserializeOwned>(
    path: &str,
    response: Response,
) -> Result<T, PayoutProviderError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        return Err(PayoutProviderError::UnexpectedResponse(format!(
            "{path} request failed with status {status}: {text}"
        )));
    }

    Ok(response.json().await?)
}

fn account_form(affiliate: AffiliateUuid, user: UserUuid) -> Vec<(&'static str, String)> {
    vec![
        ("type", "express".to_string()),
        ("metadata[affiliate_uuid]", affiliate.to_string()),
        ("metadata[user_uuid]", user.to_string()),
    ]
}

fn account_link_form(config: &StripeConfig, destination_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("account", destination_id.to_string()),
        ("refresh_url", config.refresh_url.clone()),
        ("return_url", config.return_url.clone()),
        ("type", "account_onboarding".to_string()),
    ]
}

fn transfer_form(currency: &str, transfer: &TransferRequest) -> Vec<(&'static str, String)> {
    vec![
        ("amount", transfer.amount.to_string()),
        ("currency", currency.to_string()),
        ("destination", transfer.destination_id.clone()),
        ("metadata[affiliate_uuid]", transfer.affiliate.to_string()),
        (
            "metadata[payout_request_uuid]",
            transfer.payout_request.to_string(),
        ),
        ("metadata[type]", "affiliate_payout".to_string()),
    ]
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeAccount {
    #[serde(default)]
    charges_enabled: bool,

    #[serde(default)]
    payouts_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct StripeAccountLink {
    url: String,
}
