//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    database::{self, Db},
    domain::{
        affiliates::{AffiliatesService, PgAffiliatesService},
        attribution::{AttributionService, ReferralAttributionService},
        payouts::{PayoutsService, PgPayoutsService},
        referrals::{PgReferralsService, ReferralsService},
    },
    payout_provider::{PayoutProvider, StripeConfig, StripeConnectClient},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply database migrations")]
    Migrations(#[source] sqlx::migrate::MigrateError),
}

/// Every service the outer surfaces need, sharing one pool and one provider.
#[derive(Clone)]
pub struct AppContext {
    pub affiliates: Arc<dyn AffiliatesService>,
    pub referrals: Arc<dyn ReferralsService>,
    pub payouts: Arc<dyn PayoutsService>,
    pub attribution: Arc<dyn AttributionService>,
}

impl AppContext {
    /// Connect, migrate and wire the services against Stripe Connect.
    ///
    /// # Errors
    ///
    /// Returns an error when connecting to the database or migrating it fails.
    pub async fn from_config(
        url: &str,
        max_connections: u32,
        stripe: StripeConfig,
    ) -> Result<Self, AppInitError> {
        let pool = database::connect(url, max_connections)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrations)?;

        let currency = stripe.currency.clone();

        Ok(Self::new(
            Db::new(pool),
            Arc::new(StripeConnectClient::new(stripe)),
            &currency,
        ))
    }

    /// Wire the services over an existing database handle.
    #[must_use]
    pub fn new(db: Db, provider: Arc<dyn PayoutProvider>, currency: &str) -> Self {
        let affiliates: Arc<dyn AffiliatesService> =
            Arc::new(PgAffiliatesService::new(db.clone(), provider.clone()));

        let referrals: Arc<dyn ReferralsService> = Arc::new(PgReferralsService::new(db.clone()));

        let attribution =
            ReferralAttributionService::new(affiliates.clone(), referrals.clone())
                .with_currency(currency);

        Self {
            payouts: Arc::new(PgPayoutsService::new(db, provider)),
            attribution: Arc::new(attribution),
            affiliates,
            referrals,
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}
