//! Referrals service.

use std::fmt;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{info, warn};

use crate::{
    database::Db,
    domain::{
        affiliates::{records::AffiliateUuid, repository::PgAffiliatesRepository},
        payouts::repository::PgPayoutRequestsRepository,
        referrals::{
            data::{
                Balances, ClearedBalance, DASHBOARD_RECENT_REFERRALS, Dashboard, LedgerTotals,
                NewReferral, Reconciliation, commission_for, processing_sum,
            },
            errors::ReferralsServiceError,
            records::ReferralRecord,
            repository::PgReferralsRepository,
        },
        users::UserUuid,
    },
};

#[derive(Clone)]
pub struct PgReferralsService {
    db: Db,
    referrals: PgReferralsRepository,
    affiliates: PgAffiliatesRepository,
    payouts: PgPayoutRequestsRepository,
}

impl PgReferralsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            referrals: PgReferralsRepository::new(),
            affiliates: PgAffiliatesRepository::new(),
            payouts: PgPayoutRequestsRepository::new(),
        }
    }
}

impl fmt::Debug for PgReferralsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgReferralsService")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ReferralsService for PgReferralsService {
    #[tracing::instrument(
        name = "referrals.service.append_referral",
        skip(self, referral),
        fields(
            affiliate_uuid = %referral.affiliate_uuid,
            subscription_charge_id = %referral.subscription_charge_id
        ),
        err
    )]
    async fn append_referral(
        &self,
        referral: NewReferral,
    ) -> Result<ReferralRecord, ReferralsServiceError> {
        let mut tx = self
            .db
            .begin_affiliate_transaction(referral.affiliate_uuid)
            .await?;

        let affiliate = self
            .affiliates
            .get_affiliate(&mut tx, referral.affiliate_uuid)
            .await?;

        if !affiliate.is_active {
            return Err(ReferralsServiceError::AffiliateInactive);
        }

        let commission = commission_for(referral.charge_amount, affiliate.commission_rate)
            .ok_or(ReferralsServiceError::AmountOverflow)?;

        let Some(created) = self
            .referrals
            .create_referral(&mut tx, &referral, commission)
            .await?
        else {
            return Err(ReferralsServiceError::DuplicateCharge {
                subscription_charge_id: referral.subscription_charge_id,
            });
        };

        self.affiliates
            .record_earning(&mut tx, affiliate.uuid, commission)
            .await?;

        tx.commit().await?;

        info!(
            referral_uuid = %created.uuid,
            commission_amount = created.commission_amount,
            "recorded referral commission"
        );

        Ok(created)
    }

    async fn cleared_pending(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<ClearedBalance, ReferralsServiceError> {
        let pending = self.pending_referrals(affiliate).await?;

        ClearedBalance::from_referrals(&pending, now).ok_or(ReferralsServiceError::AmountOverflow)
    }

    async fn processing_sum(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<u64, ReferralsServiceError> {
        let pending = self.pending_referrals(affiliate).await?;

        processing_sum(&pending, now).ok_or(ReferralsServiceError::AmountOverflow)
    }

    async fn list_referrals(
        &self,
        affiliate: AffiliateUuid,
        limit: u32,
    ) -> Result<Vec<ReferralRecord>, ReferralsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        let referrals = self
            .referrals
            .list_referrals(&mut tx, affiliate, limit)
            .await?;

        tx.commit().await?;

        Ok(referrals)
    }

    async fn balances(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<Balances, ReferralsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        let pending = self
            .referrals
            .list_pending_referrals(&mut tx, affiliate)
            .await?;

        let totals = self.referrals.ledger_totals(&mut tx, affiliate).await?;

        tx.commit().await?;

        Balances::from_ledger(&pending, totals, now).ok_or(ReferralsServiceError::AmountOverflow)
    }

    async fn dashboard(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Dashboard, ReferralsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let affiliate = self
            .affiliates
            .find_affiliate_by_user(&mut tx, user)
            .await?
            .ok_or(ReferralsServiceError::NotFound)?;

        let pending = self
            .referrals
            .list_pending_referrals(&mut tx, affiliate.uuid)
            .await?;

        let totals = self.referrals.ledger_totals(&mut tx, affiliate.uuid).await?;

        let recent_referrals = self
            .referrals
            .list_referrals(&mut tx, affiliate.uuid, DASHBOARD_RECENT_REFERRALS)
            .await?;

        let pending_payout_request = self
            .payouts
            .list_pending_payout_requests(&mut tx, affiliate.uuid)
            .await?
            .first()
            .map(|request| request.uuid);

        tx.commit().await?;

        let balances = Balances::from_ledger(&pending, totals, now)
            .ok_or(ReferralsServiceError::AmountOverflow)?;

        Ok(Dashboard {
            affiliate,
            balances,
            pending_payout_request,
            recent_referrals,
        })
    }

    async fn ledger_totals(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<LedgerTotals, ReferralsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        let totals = self.referrals.ledger_totals(&mut tx, affiliate).await?;

        tx.commit().await?;

        Ok(totals)
    }

    #[tracing::instrument(
        name = "referrals.service.reconcile_aggregates",
        skip(self),
        fields(affiliate_uuid = %affiliate),
        err
    )]
    async fn reconcile_aggregates(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<Reconciliation, ReferralsServiceError> {
        let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

        let record = self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        let reconciliation = Reconciliation {
            affiliate_uuid: affiliate,
            cached: LedgerTotals::cached(&record),
            ledger: self.referrals.ledger_totals(&mut tx, affiliate).await?,
        };

        if reconciliation.drifted() {
            warn!(
                cached = ?reconciliation.cached,
                ledger = ?reconciliation.ledger,
                "affiliate aggregates drifted from ledger"
            );

            self.affiliates
                .overwrite_aggregates(&mut tx, affiliate, &reconciliation.ledger)
                .await?;
        }

        tx.commit().await?;

        Ok(reconciliation)
    }
}

impl PgReferralsService {
    async fn pending_referrals(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<Vec<ReferralRecord>, ReferralsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        let pending = self
            .referrals
            .list_pending_referrals(&mut tx, affiliate)
            .await?;

        tx.commit().await?;

        Ok(pending)
    }
}

#[automock]
#[async_trait]
pub trait ReferralsService: Send + Sync {
    /// Append a commission event for a subscription charge, exactly once per
    /// charge id.
    async fn append_referral(
        &self,
        referral: NewReferral,
    ) -> Result<ReferralRecord, ReferralsServiceError>;

    /// Pending commissions that have cleared as of `now`.
    async fn cleared_pending(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<ClearedBalance, ReferralsServiceError>;

    /// Sum of pending commissions still clearing as of `now`.
    async fn processing_sum(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<u64, ReferralsServiceError>;

    /// Most recent referrals, newest first.
    async fn list_referrals(
        &self,
        affiliate: AffiliateUuid,
        limit: u32,
    ) -> Result<Vec<ReferralRecord>, ReferralsServiceError>;

    /// Cleared, processing, paid and earned amounts as of `now`.
    async fn balances(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<Balances, ReferralsServiceError>;

    /// The affiliate screen for a user.
    async fn dashboard(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Dashboard, ReferralsServiceError>;

    /// Aggregates re-derived from the ledger rows.
    async fn ledger_totals(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<LedgerTotals, ReferralsServiceError>;

    /// Overwrite the cached aggregates with the ledger's when they differ.
    async fn reconcile_aggregates(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<Reconciliation, ReferralsServiceError>;
}
