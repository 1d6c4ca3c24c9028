//! Referral attribution service.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{info, warn};

use crate::domain::{
    affiliates::AffiliatesService,
    attribution::{
        data::{Attribution, LEDGER_CURRENCY, SubscriptionActivated},
        errors::AttributionServiceError,
    },
    referrals::{
        ReferralsService, ReferralsServiceError,
        data::NewReferral,
        records::ReferralUuid,
    },
};

/// Turns subscription activations into ledger entries for the referring
/// affiliate.
#[derive(Clone)]
pub struct ReferralAttributionService {
    affiliates: Arc<dyn AffiliatesService>,
    referrals: Arc<dyn ReferralsService>,
    currency: String,
}

impl ReferralAttributionService {
    #[must_use]
    pub fn new(affiliates: Arc<dyn AffiliatesService>, referrals: Arc<dyn ReferralsService>) -> Self {
        Self {
            affiliates,
            referrals,
            currency: LEDGER_CURRENCY.to_string(),
        }
    }

    /// Accept charges in `currency` instead of the default ledger currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

impl fmt::Debug for ReferralAttributionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferralAttributionService")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AttributionService for ReferralAttributionService {
    #[tracing::instrument(
        name = "attribution.service.subscription_activated",
        skip(self, event),
        fields(
            subscription_charge_id = %event.subscription_charge_id,
            payer_user = %event.payer_user
        ),
        err
    )]
    async fn subscription_activated(
        &self,
        event: SubscriptionActivated,
    ) -> Result<Attribution, AttributionServiceError> {
        let Some(code) = event
            .referred_by_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        else {
            return Ok(Attribution::NoReferralCode);
        };

        if !event.currency.eq_ignore_ascii_case(&self.currency) {
            warn!(currency = %event.currency, "referral charge in unsupported currency");

            return Ok(Attribution::UnsupportedCurrency {
                currency: event.currency,
            });
        }

        let Some(affiliate) = self.affiliates.find_active_by_code(code).await? else {
            warn!(code, "referral code did not match an active affiliate");

            return Ok(Attribution::UnknownCode {
                code: code.to_string(),
            });
        };

        if affiliate.user_uuid == event.payer_user {
            warn!(affiliate_uuid = %affiliate.uuid, "affiliate used their own referral code");

            return Ok(Attribution::SelfReferral {
                affiliate_uuid: affiliate.uuid,
            });
        }

        let referral = NewReferral {
            uuid: ReferralUuid::new(),
            affiliate_uuid: affiliate.uuid,
            referred_user_uuid: event.payer_user,
            subscription_charge_id: event.subscription_charge_id,
            charge_amount: event.charge_amount,
            recorded_at: Timestamp::now(),
            charged_at: event.occurred_at,
        };

        match self.referrals.append_referral(referral).await {
            Ok(recorded) => Ok(Attribution::Recorded(recorded)),
            Err(ReferralsServiceError::DuplicateCharge {
                subscription_charge_id,
            }) => {
                info!("subscription charge already attributed");

                Ok(Attribution::AlreadyRecorded {
                    subscription_charge_id,
                })
            }
            Err(ReferralsServiceError::AffiliateInactive) => {
                warn!(
                    affiliate_uuid = %affiliate.uuid,
                    "affiliate deactivated during attribution"
                );

                Ok(Attribution::UnknownCode {
                    code: code.to_string(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[automock]
#[async_trait]
pub trait AttributionService: Send + Sync {
    /// Attribute a subscription charge to the affiliate whose code the payer
    /// used. Each charge id is recorded at most once.
    async fn subscription_activated(
        &self,
        event: SubscriptionActivated,
    ) -> Result<Attribution, AttributionServiceError>;
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use mockall::predicate::eq;
    use testresult::TestResult;

    use crate::domain::{
        affiliates::{
            MockAffiliatesService,
            records::{AffiliateRecord, AffiliateUuid},
        },
        referrals::{
            MockReferralsService,
            records::{ReferralRecord, ReferralStatus},
        },
        users::UserUuid,
    };

    use super::*;

    fn affiliate(user_uuid: UserUuid) -> AffiliateRecord {
        AffiliateRecord {
            uuid: AffiliateUuid::new(),
            user_uuid,
            referral_code: "PRO4X7K2".to_string(),
            commission_rate: 40,
            payout_destination_id: None,
            payout_onboarded: false,
            is_active: true,
            total_earned: 0,
            total_paid: 0,
            referral_count: 0,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn activation(payer_user: UserUuid, code: Option<&str>) -> SubscriptionActivated {
        SubscriptionActivated {
            subscription_charge_id: "ch_1".to_string(),
            payer_user,
            charge_amount: 4900,
            currency: "usd".to_string(),
            referred_by_code: code.map(str::to_string),
            occurred_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn service(
        affiliates: MockAffiliatesService,
        referrals: MockReferralsService,
    ) -> ReferralAttributionService {
        ReferralAttributionService::new(Arc::new(affiliates), Arc::new(referrals))
    }

    #[tokio::test]
    async fn no_code_records_nothing() -> TestResult {
        let attribution = service(MockAffiliatesService::new(), MockReferralsService::new())
            .subscription_activated(activation(UserUuid::new(), None))
            .await?;

        assert_eq!(attribution, Attribution::NoReferralCode);

        Ok(())
    }

    #[tokio::test]
    async fn blank_code_counts_as_no_code() -> TestResult {
        let attribution = service(MockAffiliatesService::new(), MockReferralsService::new())
            .subscription_activated(activation(UserUuid::new(), Some("   ")))
            .await?;

        assert_eq!(attribution, Attribution::NoReferralCode);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_code_is_logged_not_failed() -> TestResult {
        let mut affiliates = MockAffiliatesService::new();

        affiliates
            .expect_find_active_by_code()
            .with(eq("PRODEAD1"))
            .times(1)
            .returning(|_| Ok(None));

        let attribution = service(affiliates, MockReferralsService::new())
            .subscription_activated(activation(UserUuid::new(), Some("PRODEAD1")))
            .await?;

        assert_eq!(
            attribution,
            Attribution::UnknownCode {
                code: "PRODEAD1".to_string()
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn other_currencies_are_not_attributed() -> TestResult {
        let mut event = activation(UserUuid::new(), Some("PRO4X7K2"));
        event.currency = "eur".to_string();

        let attribution = service(MockAffiliatesService::new(), MockReferralsService::new())
            .subscription_activated(event)
            .await?;

        assert_eq!(attribution.kind(), "unsupported_currency");

        Ok(())
    }

    #[tokio::test]
    async fn self_referral_is_not_attributed() -> TestResult {
        let payer = UserUuid::new();
        let own = affiliate(payer);
        let own_uuid = own.uuid;

        let mut affiliates = MockAffiliatesService::new();

        affiliates
            .expect_find_active_by_code()
            .returning(move |_| Ok(Some(own.clone())));

        let attribution = service(affiliates, MockReferralsService::new())
            .subscription_activated(activation(payer, Some("PRO4X7K2")))
            .await?;

        assert_eq!(
            attribution,
            Attribution::SelfReferral {
                affiliate_uuid: own_uuid
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn clearance_counts_from_attribution_not_the_billing_timestamp() -> TestResult {
        let referrer = affiliate(UserUuid::new());

        let mut affiliates = MockAffiliatesService::new();

        affiliates
            .expect_find_active_by_code()
            .returning(move |_| Ok(Some(referrer.clone())));

        let attributed_from = Timestamp::now();

        let mut referrals = MockReferralsService::new();

        referrals
            .expect_append_referral()
            .withf(move |referral| {
                referral.charged_at == Timestamp::UNIX_EPOCH
                    && referral.recorded_at >= attributed_from
            })
            .times(1)
            .returning(|referral| {
                Ok(ReferralRecord {
                    uuid: referral.uuid,
                    affiliate_uuid: referral.affiliate_uuid,
                    referred_user_uuid: referral.referred_user_uuid,
                    subscription_charge_id: referral.subscription_charge_id,
                    charge_amount: referral.charge_amount,
                    commission_amount: 1960,
                    status: ReferralStatus::Pending,
                    paid_at: None,
                    created_at: referral.recorded_at,
                })
            });

        let attribution = service(affiliates, referrals)
            .subscription_activated(activation(UserUuid::new(), Some("PRO4X7K2")))
            .await?;

        assert_eq!(attribution.kind(), "recorded");

        Ok(())
    }

    #[tokio::test]
    async fn matching_code_appends_to_ledger() -> TestResult {
        let payer = UserUuid::new();
        let referrer = affiliate(UserUuid::new());
        let referrer_uuid = referrer.uuid;

        let mut affiliates = MockAffiliatesService::new();

        affiliates
            .expect_find_active_by_code()
            .with(eq("pro4x7k2"))
            .returning(move |_| Ok(Some(referrer.clone())));

        let mut referrals = MockReferralsService::new();

        referrals
            .expect_append_referral()
            .withf(move |referral| {
                referral.affiliate_uuid == referrer_uuid
                    && referral.referred_user_uuid == payer
                    && referral.charge_amount == 4900
                    && referral.subscription_charge_id == "ch_1"
            })
            .times(1)
            .returning(|referral| {
                Ok(ReferralRecord {
                    uuid: referral.uuid,
                    affiliate_uuid: referral.affiliate_uuid,
                    referred_user_uuid: referral.referred_user_uuid,
                    subscription_charge_id: referral.subscription_charge_id,
                    charge_amount: referral.charge_amount,
                    commission_amount: 1960,
                    status: ReferralStatus::Pending,
                    paid_at: None,
                    created_at: referral.recorded_at,
                })
            });

        let attribution = service(affiliates, referrals)
            .subscription_activated(activation(payer, Some("pro4x7k2")))
            .await?;

        assert!(
            matches!(&attribution, Attribution::Recorded(r) if r.commission_amount == 1960),
            "expected Recorded, got {attribution:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn redelivered_charge_is_already_recorded() -> TestResult {
        let mut affiliates = MockAffiliatesService::new();
        let referrer = affiliate(UserUuid::new());

        affiliates
            .expect_find_active_by_code()
            .returning(move |_| Ok(Some(referrer.clone())));

        let mut referrals = MockReferralsService::new();

        referrals.expect_append_referral().returning(|referral| {
            Err(ReferralsServiceError::DuplicateCharge {
                subscription_charge_id: referral.subscription_charge_id,
            })
        });

        let attribution = service(affiliates, referrals)
            .subscription_activated(activation(UserUuid::new(), Some("PRO4X7K2")))
            .await?;

        assert_eq!(
            attribution,
            Attribution::AlreadyRecorded {
                subscription_charge_id: "ch_1".to_string()
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn storage_failures_surface() {
        let mut affiliates = MockAffiliatesService::new();
        let referrer = affiliate(UserUuid::new());

        affiliates
            .expect_find_active_by_code()
            .returning(move |_| Ok(Some(referrer.clone())));

        let mut referrals = MockReferralsService::new();

        referrals
            .expect_append_referral()
            .returning(|_| Err(ReferralsServiceError::Sql(sqlx::Error::PoolTimedOut)));

        let result = service(affiliates, referrals)
            .subscription_activated(activation(UserUuid::new(), Some("PRO4X7K2")))
            .await;

        assert!(
            matches!(result, Err(AttributionServiceError::Referrals(_))),
            "expected Referrals error, got {result:?}"
        );
    }
}
