//! Affiliates service.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, info, warn};

use crate::{
    database::{Db, violates_unique_constraint},
    domain::{
        affiliates::{
            codes::{
                MAX_CODE_ATTEMPTS, RandomReferralCodes, ReferralCodeGenerator,
                normalize_referral_code,
            },
            data::{
                DEFAULT_COMMISSION_RATE, NewAffiliate, OnboardingLink, OnboardingStatus,
                Registration,
            },
            errors::AffiliatesServiceError,
            records::{AffiliateRecord, AffiliateUuid},
            repository::{PgAffiliatesRepository, REFERRAL_CODE_CONSTRAINT},
        },
        users::UserUuid,
    },
    payout_provider::PayoutProvider,
};

#[derive(Clone)]
pub struct PgAffiliatesService {
    db: Db,
    repository: PgAffiliatesRepository,
    provider: Arc<dyn PayoutProvider>,
    codes: Arc<dyn ReferralCodeGenerator>,
}

impl PgAffiliatesService {
    #[must_use]
    pub fn new(db: Db, provider: Arc<dyn PayoutProvider>) -> Self {
        Self {
            db,
            repository: PgAffiliatesRepository::new(),
            provider,
            codes: Arc::new(RandomReferralCodes),
        }
    }

    /// Replace the source of candidate referral codes.
    #[must_use]
    pub fn with_code_generator(mut self, codes: Arc<dyn ReferralCodeGenerator>) -> Self {
        self.codes = codes;
        self
    }
}

impl fmt::Debug for PgAffiliatesService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgAffiliatesService")
            .field("db", &self.db)
            .field("codes", &self.codes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AffiliatesService for PgAffiliatesService {
    #[tracing::instrument(
        name = "affiliates.service.register",
        skip(self),
        fields(user_uuid = %user),
        err
    )]
    async fn register(&self, user: UserUuid) -> Result<Registration, AffiliatesServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let existing = self.repository.find_affiliate_by_user(&mut tx, user).await?;

        tx.commit().await?;

        if let Some(existing) = existing {
            return Ok(Registration::AlreadyRegistered(existing));
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = NewAffiliate {
                uuid: AffiliateUuid::new(),
                user_uuid: user,
                referral_code: self.codes.generate(),
                commission_rate: DEFAULT_COMMISSION_RATE,
            };

            // A failed insert aborts the transaction, so every attempt gets its own.
            let mut tx = self.db.begin_transaction().await?;

            match self.repository.create_affiliate(&mut tx, &candidate).await {
                Ok(Some(created)) => {
                    tx.commit().await?;

                    info!(
                        affiliate_uuid = %created.uuid,
                        referral_code = %created.referral_code,
                        "registered affiliate"
                    );

                    return Ok(Registration::Created(created));
                }
                Ok(None) => {
                    let existing = self
                        .repository
                        .find_affiliate_by_user(&mut tx, user)
                        .await?
                        .ok_or(AffiliatesServiceError::NotFound)?;

                    tx.commit().await?;

                    return Ok(Registration::AlreadyRegistered(existing));
                }
                Err(error) if violates_unique_constraint(&error, REFERRAL_CODE_CONSTRAINT) => {
                    debug!(
                        attempt,
                        referral_code = %candidate.referral_code,
                        "referral code collision"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        warn!(
            attempts = MAX_CODE_ATTEMPTS,
            "gave up generating a referral code"
        );

        Err(AffiliatesServiceError::CodeGenerationExhausted {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    async fn get_affiliate(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<AffiliateRecord, AffiliatesServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.repository.get_affiliate(&mut tx, affiliate).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn get_affiliate_by_user(
        &self,
        user: UserUuid,
    ) -> Result<AffiliateRecord, AffiliatesServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.repository.find_affiliate_by_user(&mut tx, user).await?;

        tx.commit().await?;

        record.ok_or(AffiliatesServiceError::NotFound)
    }

    async fn find_active_by_code(
        &self,
        code: &str,
    ) -> Result<Option<AffiliateRecord>, AffiliatesServiceError> {
        let Some(code) = normalize_referral_code(code) else {
            return Ok(None);
        };

        let mut tx = self.db.begin_transaction().await?;

        let record = self.repository.find_affiliate_by_code(&mut tx, &code).await?;

        tx.commit().await?;

        Ok(record.filter(|affiliate| affiliate.is_active))
    }

    async fn validate_code(&self, code: &str) -> bool {
        match self.find_active_by_code(code).await {
            Ok(found) => found.is_some(),
            Err(error) => {
                warn!(error = %error, "referral code lookup failed");

                false
            }
        }
    }

    #[tracing::instrument(
        name = "affiliates.service.link_payout_destination",
        skip(self),
        fields(affiliate_uuid = %affiliate),
        err
    )]
    async fn link_payout_destination(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<OnboardingLink, AffiliatesServiceError> {
        let record = self.get_affiliate(affiliate).await?;

        let destination_id = match record.payout_destination_id {
            Some(existing) => existing,
            None => {
                let created = self
                    .provider
                    .create_destination(affiliate, record.user_uuid)
                    .await?;

                let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

                let stored = self
                    .repository
                    .set_payout_destination(&mut tx, affiliate, &created)
                    .await?;

                tx.commit().await?;

                if stored == created {
                    info!(destination_id = %stored, "linked payout destination");
                } else {
                    warn!(
                        orphaned_destination_id = %created,
                        destination_id = %stored,
                        "payout destination linked concurrently"
                    );
                }

                stored
            }
        };

        let url = self
            .provider
            .create_onboarding_link(&destination_id)
            .await?;

        Ok(OnboardingLink {
            destination_id,
            url,
        })
    }

    #[tracing::instrument(
        name = "affiliates.service.confirm_onboarding",
        skip(self),
        fields(affiliate_uuid = %affiliate),
        err
    )]
    async fn confirm_onboarding(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<OnboardingStatus, AffiliatesServiceError> {
        let record = self.get_affiliate(affiliate).await?;

        let Some(destination_id) = record.payout_destination_id else {
            return Ok(OnboardingStatus::not_connected());
        };

        if record.payout_onboarded {
            return Ok(OnboardingStatus {
                connected: true,
                onboarded: true,
                destination_id: Some(destination_id),
            });
        }

        let status = self.provider.destination_status(&destination_id).await?;

        if status.is_onboarded() {
            let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

            let flipped = self.repository.mark_onboarded(&mut tx, affiliate).await?;

            tx.commit().await?;

            if flipped {
                info!(destination_id = %destination_id, "payout destination onboarded");
            }
        }

        Ok(OnboardingStatus {
            connected: true,
            onboarded: status.is_onboarded(),
            destination_id: Some(destination_id),
        })
    }

    #[tracing::instrument(
        name = "affiliates.service.deactivate",
        skip(self),
        fields(affiliate_uuid = %affiliate),
        err
    )]
    async fn deactivate(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<AffiliateRecord, AffiliatesServiceError> {
        let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

        let record = self
            .repository
            .deactivate_affiliate(&mut tx, affiliate)
            .await?;

        tx.commit().await?;

        info!("deactivated affiliate");

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait AffiliatesService: Send + Sync {
    /// Enrol a user as an affiliate, or return their existing enrolment.
    async fn register(&self, user: UserUuid) -> Result<Registration, AffiliatesServiceError>;

    /// Retrieve a single affiliate.
    async fn get_affiliate(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<AffiliateRecord, AffiliatesServiceError>;

    /// Retrieve the affiliate enrolled for a user.
    async fn get_affiliate_by_user(
        &self,
        user: UserUuid,
    ) -> Result<AffiliateRecord, AffiliatesServiceError>;

    /// Resolve a referral code, case-insensitively, to an active affiliate.
    async fn find_active_by_code(
        &self,
        code: &str,
    ) -> Result<Option<AffiliateRecord>, AffiliatesServiceError>;

    /// Whether a code belongs to an active affiliate. Lookup failures count
    /// as invalid.
    async fn validate_code(&self, code: &str) -> bool;

    /// Create (once) the affiliate's payout destination and return a fresh
    /// onboarding link for it.
    async fn link_payout_destination(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<OnboardingLink, AffiliatesServiceError>;

    /// Refresh onboarding state from the provider.
    async fn confirm_onboarding(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<OnboardingStatus, AffiliatesServiceError>;

    /// Stop the affiliate's code from attributing new referrals.
    async fn deactivate(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<AffiliateRecord, AffiliatesServiceError>;
}
