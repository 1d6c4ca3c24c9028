//! Payouts service.
//!
//! Approval runs in three steps so that no database lock is held while the
//! provider moves money:
//!
//! 1. Under the affiliate lock, check the request is still pending, load the
//!    referrals reserved for it when it was made and mark the approval as
//!    started.
//! 2. Without a transaction, issue the transfer (keyed by the request uuid)
//!    unless a reference is already recorded, then record the reference.
//! 3. Under the affiliate lock again, mark the reserved referrals paid,
//!    settle the request and bump `total_paid`, all in one transaction.
//!
//! A failure in step 3 leaves the recorded reference in place, so retrying
//! the approval resumes at step 3 without transferring twice.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashSet;
use sqlx::{Postgres, Transaction};
use tracing::{error, info, warn};

use crate::{
    database::Db,
    domain::{
        affiliates::{records::AffiliateUuid, repository::PgAffiliatesRepository},
        payouts::{
            data::{MINIMUM_PAYOUT_AMOUNT, NewPayoutRequest, PayoutRequestFilter},
            errors::PayoutsServiceError,
            records::{PayoutRequestRecord, PayoutRequestUuid},
            repository::PgPayoutRequestsRepository,
        },
        referrals::{data::ClearedBalance, repository::PgReferralsRepository},
    },
    payout_provider::{PayoutProvider, TransferRequest},
};

#[derive(Clone)]
pub struct PgPayoutsService {
    db: Db,
    payouts: PgPayoutRequestsRepository,
    referrals: PgReferralsRepository,
    affiliates: PgAffiliatesRepository,
    provider: Arc<dyn PayoutProvider>,
}

impl PgPayoutsService {
    #[must_use]
    pub fn new(db: Db, provider: Arc<dyn PayoutProvider>) -> Self {
        Self {
            db,
            payouts: PgPayoutRequestsRepository::new(),
            referrals: PgReferralsRepository::new(),
            affiliates: PgAffiliatesRepository::new(),
            provider,
        }
    }

    /// Load a request and insist it is still pending.
    async fn pending_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError> {
        let record = self.payouts.get_payout_request(tx, request).await?;

        if record.status.is_terminal() {
            return Err(PayoutsServiceError::AlreadyProcessed);
        }

        Ok(record)
    }

    /// The referrals a request pays: those reserved for it when it was made.
    /// Their sum must equal the quoted amount.
    async fn settlement_for(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: &PayoutRequestRecord,
    ) -> Result<ClearedBalance, PayoutsServiceError> {
        let reserved = self
            .referrals
            .list_reserved_referrals(tx, request.uuid)
            .await?;

        let mut charges = FxHashSet::default();
        let mut settlement = ClearedBalance::default();

        for referral in &reserved {
            if !charges.insert(referral.subscription_charge_id.as_str()) {
                error!(
                    subscription_charge_id = %referral.subscription_charge_id,
                    "subscription charge settled twice"
                );

                return Err(PayoutsServiceError::InvariantViolation(format!(
                    "charge {} appears twice in one settlement",
                    referral.subscription_charge_id
                )));
            }

            settlement.amount = settlement
                .amount
                .checked_add(referral.commission_amount)
                .ok_or(PayoutsServiceError::AmountOverflow)?;
            settlement.referrals.push(referral.uuid);
        }

        if settlement.amount != request.amount {
            error!(
                quoted = request.amount,
                derived = settlement.amount,
                "reserved referrals no longer match the quoted amount"
            );

            return Err(PayoutsServiceError::SettlementMismatch {
                quoted: request.amount,
                derived: settlement.amount,
            });
        }

        Ok(settlement)
    }

    /// Step 2: move the funds and record the provider's reference.
    async fn issue_transfer(
        &self,
        request: &PayoutRequestRecord,
        destination_id: String,
    ) -> Result<String, PayoutsServiceError> {
        let transfer = TransferRequest {
            destination_id,
            amount: request.amount,
            idempotency_key: request.uuid.to_string(),
            affiliate: request.affiliate_uuid,
            payout_request: request.uuid,
        };

        let receipt = match self.provider.transfer(&transfer).await {
            Ok(receipt) => receipt,
            Err(provider_error) => {
                warn!(error = %provider_error, "payout transfer failed");

                if provider_error.is_definite_failure() {
                    let mut tx = self
                        .db
                        .begin_affiliate_transaction(request.affiliate_uuid)
                        .await?;

                    self.payouts.abandon_approval(&mut tx, request.uuid).await?;

                    tx.commit().await?;
                }

                return Err(PayoutsServiceError::Transfer(provider_error));
            }
        };

        let mut tx = self
            .db
            .begin_affiliate_transaction(request.affiliate_uuid)
            .await?;

        let recorded = self
            .payouts
            .record_transfer(&mut tx, request.uuid, &receipt.reference)
            .await?;

        tx.commit().await?;

        let Some(recorded) = recorded else {
            error!(
                transfer_reference = %receipt.reference,
                "transfer issued for a payout request that is no longer pending"
            );

            return Err(PayoutsServiceError::InvariantViolation(format!(
                "transfer {} issued for settled payout request {}",
                receipt.reference, request.uuid
            )));
        };

        info!(transfer_reference = %recorded, "payout transfer issued");

        Ok(recorded)
    }
}

impl fmt::Debug for PgPayoutsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgPayoutsService")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PayoutsService for PgPayoutsService {
    #[tracing::instrument(
        name = "payouts.service.request_payout",
        skip(self),
        fields(affiliate_uuid = %affiliate),
        err
    )]
    async fn request_payout(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError> {
        let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

        let record = self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        if !record.can_receive_payouts() {
            return Err(PayoutsServiceError::NotOnboarded);
        }

        let open = self
            .payouts
            .list_pending_payout_requests(&mut tx, affiliate)
            .await?;

        match open.len() {
            0 => {}
            1 => return Err(PayoutsServiceError::RequestAlreadyPending),
            count => {
                error!(count, "affiliate has several pending payout requests");

                return Err(PayoutsServiceError::InvariantViolation(format!(
                    "{count} pending payout requests for affiliate {affiliate}"
                )));
            }
        }

        let pending = self
            .referrals
            .list_pending_referrals(&mut tx, affiliate)
            .await?;

        let cleared = ClearedBalance::from_referrals(&pending, now)
            .ok_or(PayoutsServiceError::AmountOverflow)?;

        if cleared.is_empty() {
            return Err(PayoutsServiceError::NoClearedFunds);
        }

        if cleared.amount < MINIMUM_PAYOUT_AMOUNT {
            return Err(PayoutsServiceError::BelowMinimum {
                cleared: cleared.amount,
                minimum: MINIMUM_PAYOUT_AMOUNT,
            });
        }

        let created = self
            .payouts
            .create_payout_request(
                &mut tx,
                &NewPayoutRequest {
                    uuid: PayoutRequestUuid::new(),
                    affiliate_uuid: affiliate,
                    amount: cleared.amount,
                    requested_at: now,
                },
            )
            .await?;

        let reserved = self
            .referrals
            .reserve_for_payout(&mut tx, &cleared.referrals, created.uuid)
            .await?;

        let expected = u64::try_from(cleared.referrals.len())?;

        if reserved != expected {
            error!(reserved, expected, "payout request reserved an unexpected number of referrals");

            return Err(PayoutsServiceError::InvariantViolation(format!(
                "reserved {reserved} of {expected} referrals for payout request {}",
                created.uuid
            )));
        }

        tx.commit().await?;

        info!(
            payout_request_uuid = %created.uuid,
            amount = created.amount,
            referral_count = cleared.referrals.len(),
            "payout requested"
        );

        Ok(created)
    }

    #[tracing::instrument(
        name = "payouts.service.approve",
        skip(self),
        fields(payout_request_uuid = %request),
        err
    )]
    async fn approve(
        &self,
        request: PayoutRequestUuid,
        now: Timestamp,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError> {
        let affiliate = self.get_payout_request(request).await?.affiliate_uuid;

        let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

        let pending = self.pending_request(&mut tx, request).await?;

        let record = self.affiliates.get_affiliate(&mut tx, affiliate).await?;

        let destination_id = record
            .payout_destination_id
            .filter(|_| record.payout_onboarded)
            .ok_or(PayoutsServiceError::NotOnboarded)?;

        self.settlement_for(&mut tx, &pending).await?;

        let started = self
            .payouts
            .start_approval(&mut tx, request, now)
            .await?
            .ok_or(PayoutsServiceError::AlreadyProcessed)?;

        tx.commit().await?;

        match started.transfer_reference.as_deref() {
            Some(reference) => {
                info!(
                    transfer_reference = %reference,
                    "transfer already issued, resuming settlement"
                );
            }
            None => {
                self.issue_transfer(&started, destination_id).await?;
            }
        }

        let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

        let pending = self.pending_request(&mut tx, request).await?;

        let settlement = self.settlement_for(&mut tx, &pending).await?;

        let marked = self
            .referrals
            .mark_paid(&mut tx, request, &settlement.referrals, now)
            .await?;

        let expected = u64::try_from(settlement.referrals.len())?;

        if marked != expected {
            error!(marked, expected, "settlement marked an unexpected number of referrals");

            return Err(PayoutsServiceError::InvariantViolation(format!(
                "marked {marked} of {expected} referrals paid"
            )));
        }

        let settled = self
            .payouts
            .settle_payout_request(&mut tx, request, now)
            .await?
            .ok_or(PayoutsServiceError::AlreadyProcessed)?;

        self.affiliates
            .record_payout(&mut tx, affiliate, settled.amount)
            .await?;

        tx.commit().await?;

        info!(
            amount = settled.amount,
            referral_count = expected,
            "payout settled"
        );

        Ok(settled)
    }

    #[tracing::instrument(
        name = "payouts.service.reject",
        skip(self, reason),
        fields(payout_request_uuid = %request),
        err
    )]
    async fn reject(
        &self,
        request: PayoutRequestUuid,
        reason: String,
        now: Timestamp,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError> {
        let reason = reason.trim();

        if reason.is_empty() {
            return Err(PayoutsServiceError::InvalidReason);
        }

        let affiliate = self.get_payout_request(request).await?.affiliate_uuid;

        let mut tx = self.db.begin_affiliate_transaction(affiliate).await?;

        let pending = self.pending_request(&mut tx, request).await?;

        if pending.transfer_reference.is_some() {
            return Err(PayoutsServiceError::TransferAlreadyIssued);
        }

        if pending.approval_started_at.is_some() {
            return Err(PayoutsServiceError::ApprovalInProgress);
        }

        let rejected = self
            .payouts
            .reject_payout_request(&mut tx, request, reason, now)
            .await?
            .ok_or(PayoutsServiceError::AlreadyProcessed)?;

        let released = self
            .referrals
            .release_reserved_referrals(&mut tx, request)
            .await?;

        tx.commit().await?;

        info!(reason, released, "payout request rejected");

        Ok(rejected)
    }

    async fn list_payout_requests(
        &self,
        filter: PayoutRequestFilter,
    ) -> Result<Vec<PayoutRequestRecord>, PayoutsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let requests = match filter {
            PayoutRequestFilter::Status(status) => {
                self.payouts
                    .list_payout_requests_by_status(&mut tx, status)
                    .await?
            }
            PayoutRequestFilter::Affiliate(affiliate) => {
                self.affiliates.get_affiliate(&mut tx, affiliate).await?;

                self.payouts
                    .list_payout_requests_by_affiliate(&mut tx, affiliate)
                    .await?
            }
        };

        tx.commit().await?;

        Ok(requests)
    }

    async fn get_payout_request(
        &self,
        request: PayoutRequestUuid,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.payouts.get_payout_request(&mut tx, request).await?;

        tx.commit().await?;

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait PayoutsService: Send + Sync {
    /// Open a payout request for the affiliate's cleared balance as of `now`.
    async fn request_payout(
        &self,
        affiliate: AffiliateUuid,
        now: Timestamp,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError>;

    /// Transfer the quoted amount and settle the request.
    async fn approve(
        &self,
        request: PayoutRequestUuid,
        now: Timestamp,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError>;

    /// Close a pending request without paying it. Its referrals stay pending.
    async fn reject(
        &self,
        request: PayoutRequestUuid,
        reason: String,
        now: Timestamp,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError>;

    /// List requests by status or by affiliate.
    async fn list_payout_requests(
        &self,
        filter: PayoutRequestFilter,
    ) -> Result<Vec<PayoutRequestRecord>, PayoutsServiceError>;

    /// Retrieve a single request.
    async fn get_payout_request(
        &self,
        request: PayoutRequestUuid,
    ) -> Result<PayoutRequestRecord, PayoutsServiceError>;
}

#[cfg(test)]
mod tests {
    use sqlx::query;
    use testresult::TestResult;

    use crate::{
        domain::{
            affiliates::AffiliatesService,
            attribution::{AttributionService, data::SubscriptionActivated},
            payouts::records::PayoutStatus,
            referrals::{ReferralsService, records::ReferralStatus},
            users::UserUuid,
        },
        payout_provider::{MockPayoutProvider, PayoutProviderError, TransferReceipt},
        test::{
            TestContext,
            helpers::{
                FixedReferralCodes, days_after, days_before, onboard, record_referral,
                register_affiliate,
            },
        },
    };

    use super::*;

    fn transfers_once(provider: &mut MockPayoutProvider) {
        provider
            .expect_transfer()
            .times(1)
            .returning(|transfer| {
                Ok(TransferReceipt {
                    reference: format!("tr_{}", transfer.idempotency_key),
                })
            });
    }

    async fn request_status(ctx: &TestContext, request: PayoutRequestUuid) -> TestResult<PayoutStatus> {
        Ok(ctx.payouts.get_payout_request(request).await?.status)
    }

    #[tokio::test]
    async fn payouts_require_onboarding() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let result = ctx.payouts.request_payout(affiliate.uuid, now).await;

        assert!(
            matches!(result, Err(PayoutsServiceError::NotOnboarded)),
            "expected NotOnboarded, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn processing_commissions_cannot_be_requested() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 1)).await?;

        let result = ctx.payouts.request_payout(affiliate.uuid, now).await;

        assert!(
            matches!(result, Err(PayoutsServiceError::NoClearedFunds)),
            "expected NoClearedFunds, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn cleared_balance_below_minimum_is_refused() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        // 40% of 2498 is 999.2, floored to 999.
        record_referral(&ctx, affiliate.uuid, "ch_1", 2498, days_before(now, 30)).await?;

        let result = ctx.payouts.request_payout(affiliate.uuid, now).await;

        assert!(
            matches!(
                result,
                Err(PayoutsServiceError::BelowMinimum {
                    cleared: 999,
                    minimum: 1000
                })
            ),
            "expected BelowMinimum, got {result:?}"
        );

        assert_eq!(
            result.err().map(|error| error.to_string()).as_deref(),
            Some("minimum payout is $10.00; cleared earnings are $9.99")
        );

        Ok(())
    }

    #[tokio::test]
    async fn cleared_balance_at_minimum_is_requested() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 2500, days_before(now, 30)).await?;
        record_referral(&ctx, affiliate.uuid, "ch_2", 4900, days_before(now, 1)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        assert_eq!(request.amount, 1000);
        assert_eq!(request.status, PayoutStatus::Pending);
        assert_eq!(request.transfer_reference, None);

        Ok(())
    }

    #[tokio::test]
    async fn only_one_request_may_be_pending() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        ctx.payouts.request_payout(affiliate.uuid, now).await?;

        let result = ctx.payouts.request_payout(affiliate.uuid, now).await;

        assert!(
            matches!(result, Err(PayoutsServiceError::RequestAlreadyPending)),
            "expected RequestAlreadyPending, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_requests_open_one_request() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let (first, second) = tokio::join!(
            ctx.payouts.request_payout(affiliate.uuid, now),
            ctx.payouts.request_payout(affiliate.uuid, now)
        );

        let succeeded = [first.is_ok(), second.is_ok()]
            .into_iter()
            .filter(|ok| *ok)
            .count();

        assert_eq!(succeeded, 1);

        let pending = ctx
            .payouts
            .list_payout_requests(PayoutRequestFilter::Status(PayoutStatus::Pending))
            .await?;

        assert_eq!(pending.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn referred_signup_is_paid_out_after_a_rejection() -> TestResult {
        let mut provider = MockPayoutProvider::new();

        provider
            .expect_transfer()
            .withf(|transfer| transfer.destination_id == "acct_test" && transfer.amount == 1960)
            .times(1)
            .returning(|transfer| {
                Ok(TransferReceipt {
                    reference: format!("tr_{}", transfer.idempotency_key),
                })
            });

        let ctx =
            TestContext::with_provider_and_codes(provider, FixedReferralCodes::new(["PRO4X7K2"]))
                .await;

        let billed_at = Timestamp::now();
        let now = days_after(billed_at, 30);

        let affiliate = register_affiliate(&ctx).await?;

        assert_eq!(affiliate.referral_code, "PRO4X7K2");

        onboard(&ctx, affiliate.uuid).await?;

        ctx.attribution
            .subscription_activated(SubscriptionActivated {
                subscription_charge_id: "ch_pro_monthly".to_string(),
                payer_user: UserUuid::new(),
                charge_amount: 4900,
                currency: "usd".to_string(),
                referred_by_code: Some("pro4x7k2".to_string()),
                occurred_at: billed_at,
            })
            .await?;

        let first = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        assert_eq!(first.amount, 1960);

        let rejected = ctx
            .payouts
            .reject(first.uuid, "  verify tax details  ".to_string(), now)
            .await?;

        assert_eq!(rejected.status, PayoutStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("verify tax details"));

        let balances = ctx.referrals.balances(affiliate.uuid, now).await?;

        assert_eq!(balances.cleared, 1960);

        let second = ctx.payouts.request_payout(affiliate.uuid, now).await?;
        let settled = ctx.payouts.approve(second.uuid, now).await?;

        assert_eq!(settled.status, PayoutStatus::Paid);
        assert_eq!(settled.amount, 1960);
        assert_eq!(
            settled.transfer_reference,
            Some(format!("tr_{}", second.uuid))
        );

        let referrals = ctx.referrals.list_referrals(affiliate.uuid, 10).await?;

        assert_eq!(referrals.len(), 1);
        assert!(
            referrals
                .iter()
                .all(|referral| referral.status == ReferralStatus::Paid && referral.paid_at.is_some())
        );

        let stored = ctx.affiliates.get_affiliate(affiliate.uuid).await?;

        assert_eq!(stored.total_paid, 1960);
        assert_eq!(stored.total_earned, 1960);

        let balances = ctx.referrals.balances(affiliate.uuid, now).await?;

        assert_eq!(balances.cleared, 0);
        assert_eq!(balances.paid, 1960);

        assert_eq!(request_status(&ctx, first.uuid).await?, PayoutStatus::Rejected);

        Ok(())
    }

    #[tokio::test]
    async fn failed_settlement_resumes_without_a_second_transfer() -> TestResult {
        let mut provider = MockPayoutProvider::new();

        transfers_once(&mut provider);

        let ctx = TestContext::with_provider(provider).await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        query(
            "CREATE FUNCTION block_settlement() RETURNS trigger AS $$ \
             BEGIN RAISE EXCEPTION 'settlement blocked'; END $$ LANGUAGE plpgsql",
        )
        .execute(ctx.db.pool())
        .await?;

        query(
            "CREATE TRIGGER block_settlement BEFORE UPDATE ON payout_requests \
             FOR EACH ROW WHEN (NEW.status = 'paid') EXECUTE FUNCTION block_settlement()",
        )
        .execute(ctx.db.pool())
        .await?;

        let result = ctx.payouts.approve(request.uuid, now).await;

        assert!(
            matches!(result, Err(PayoutsServiceError::Sql(_))),
            "expected Sql, got {result:?}"
        );

        let stalled = ctx.payouts.get_payout_request(request.uuid).await?;

        assert_eq!(stalled.status, PayoutStatus::Pending);
        assert_eq!(
            stalled.transfer_reference,
            Some(format!("tr_{}", request.uuid))
        );

        let referrals = ctx.referrals.list_referrals(affiliate.uuid, 10).await?;

        assert!(
            referrals
                .iter()
                .all(|referral| referral.status == ReferralStatus::Pending)
        );

        assert_eq!(ctx.affiliates.get_affiliate(affiliate.uuid).await?.total_paid, 0);

        let result = ctx
            .payouts
            .reject(request.uuid, "changed my mind".to_string(), now)
            .await;

        assert!(
            matches!(result, Err(PayoutsServiceError::TransferAlreadyIssued)),
            "expected TransferAlreadyIssued, got {result:?}"
        );

        query("DROP TRIGGER block_settlement ON payout_requests")
            .execute(ctx.db.pool())
            .await?;

        let settled = ctx.payouts.approve(request.uuid, now).await?;

        assert_eq!(settled.status, PayoutStatus::Paid);
        assert_eq!(ctx.affiliates.get_affiliate(affiliate.uuid).await?.total_paid, 1960);

        Ok(())
    }

    #[tokio::test]
    async fn refused_transfer_leaves_request_rejectable() -> TestResult {
        let mut provider = MockPayoutProvider::new();

        provider.expect_transfer().times(1).returning(|_| {
            Err(PayoutProviderError::UnexpectedResponse(
                "insufficient platform balance".to_string(),
            ))
        });

        let ctx = TestContext::with_provider(provider).await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        let result = ctx.payouts.approve(request.uuid, now).await;

        assert!(
            matches!(result, Err(PayoutsServiceError::Transfer(_))),
            "expected Transfer, got {result:?}"
        );

        let stored = ctx.payouts.get_payout_request(request.uuid).await?;

        assert_eq!(stored.status, PayoutStatus::Pending);
        assert_eq!(stored.approval_started_at, None);
        assert_eq!(stored.transfer_reference, None);

        let rejected = ctx
            .payouts
            .reject(request.uuid, "destination closed".to_string(), now)
            .await?;

        assert_eq!(rejected.status, PayoutStatus::Rejected);

        Ok(())
    }

    #[tokio::test]
    async fn interrupted_approval_blocks_rejection() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        query("UPDATE payout_requests SET approval_started_at = now() WHERE uuid = $1")
            .bind(request.uuid)
            .execute(ctx.db.pool())
            .await?;

        let result = ctx
            .payouts
            .reject(request.uuid, "too slow".to_string(), now)
            .await;

        assert!(
            matches!(result, Err(PayoutsServiceError::ApprovalInProgress)),
            "expected ApprovalInProgress, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn commissions_recorded_after_the_request_stay_pending() -> TestResult {
        let mut provider = MockPayoutProvider::new();

        transfers_once(&mut provider);

        let ctx = TestContext::with_provider(provider).await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        let quoted = record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        let later = record_referral(&ctx, affiliate.uuid, "ch_2", 2500, now).await?;

        let settled = ctx.payouts.approve(request.uuid, now).await?;

        assert_eq!(settled.amount, quoted.commission_amount);

        let referrals = ctx.referrals.list_referrals(affiliate.uuid, 10).await?;

        for referral in referrals {
            let expected = if referral.uuid == later.uuid {
                ReferralStatus::Pending
            } else {
                ReferralStatus::Paid
            };

            assert_eq!(referral.status, expected, "{}", referral.subscription_charge_id);
        }

        Ok(())
    }

    #[tokio::test]
    async fn backdated_commission_is_not_swept_into_an_open_request() -> TestResult {
        let mut provider = MockPayoutProvider::new();

        provider
            .expect_transfer()
            .withf(|transfer| transfer.amount == 1960)
            .times(1)
            .returning(|transfer| {
                Ok(TransferReceipt {
                    reference: format!("tr_{}", transfer.idempotency_key),
                })
            });

        let ctx = TestContext::with_provider(provider).await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        let late =
            record_referral(&ctx, affiliate.uuid, "ch_late", 2500, days_before(now, 40)).await?;

        let settled = ctx.payouts.approve(request.uuid, now).await?;

        assert_eq!(settled.amount, 1960);

        let balances = ctx.referrals.balances(affiliate.uuid, now).await?;

        assert_eq!(balances.paid, 1960);
        assert_eq!(balances.cleared, late.commission_amount);

        Ok(())
    }

    #[tokio::test]
    async fn late_commission_after_the_transfer_still_settles_the_quote() -> TestResult {
        // The provider must not be asked to transfer again.
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        let quoted =
            record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 60)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        assert_eq!(request.amount, 1960);

        query(
            "UPDATE payout_requests \
             SET transfer_reference = 'tr_issued', approval_started_at = now() \
             WHERE uuid = $1",
        )
        .bind(request.uuid)
        .execute(ctx.db.pool())
        .await?;

        let late =
            record_referral(&ctx, affiliate.uuid, "ch_late", 4900, days_before(now, 59)).await?;

        let settled = ctx.payouts.approve(request.uuid, now).await?;

        assert_eq!(settled.status, PayoutStatus::Paid);
        assert_eq!(settled.amount, 1960);
        assert_eq!(settled.transfer_reference.as_deref(), Some("tr_issued"));

        let referrals = ctx.referrals.list_referrals(affiliate.uuid, 10).await?;

        for referral in &referrals {
            let expected = if referral.uuid == quoted.uuid {
                ReferralStatus::Paid
            } else {
                ReferralStatus::Pending
            };

            assert_eq!(referral.status, expected, "{}", referral.subscription_charge_id);
        }

        assert!(referrals.iter().any(|referral| referral.uuid == late.uuid));

        assert_eq!(ctx.affiliates.get_affiliate(affiliate.uuid).await?.total_paid, 1960);

        let next = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        assert_eq!(next.amount, late.commission_amount);

        Ok(())
    }

    #[tokio::test]
    async fn altered_reservation_blocks_approval_before_transfer() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        let quoted =
            record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        query("UPDATE referrals SET commission_amount = 2960 WHERE uuid = $1")
            .bind(quoted.uuid)
            .execute(ctx.db.pool())
            .await?;

        let result = ctx.payouts.approve(request.uuid, now).await;

        assert!(
            matches!(
                result,
                Err(PayoutsServiceError::SettlementMismatch {
                    quoted: 1960,
                    derived: 2960
                })
            ),
            "expected SettlementMismatch, got {result:?}"
        );

        let stored = ctx.payouts.get_payout_request(request.uuid).await?;

        assert_eq!(stored.status, PayoutStatus::Pending);
        assert_eq!(stored.approval_started_at, None);

        Ok(())
    }

    #[tokio::test]
    async fn decisions_are_final() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let affiliate = register_affiliate(&ctx).await?;

        onboard(&ctx, affiliate.uuid).await?;

        record_referral(&ctx, affiliate.uuid, "ch_1", 4900, days_before(now, 30)).await?;

        let request = ctx.payouts.request_payout(affiliate.uuid, now).await?;

        let blank = ctx.payouts.reject(request.uuid, "   ".to_string(), now).await;

        assert!(
            matches!(blank, Err(PayoutsServiceError::InvalidReason)),
            "expected InvalidReason, got {blank:?}"
        );

        ctx.payouts
            .reject(request.uuid, "duplicate account".to_string(), now)
            .await?;

        let again = ctx
            .payouts
            .reject(request.uuid, "duplicate account".to_string(), now)
            .await;

        assert!(
            matches!(again, Err(PayoutsServiceError::AlreadyProcessed)),
            "expected AlreadyProcessed, got {again:?}"
        );

        let approve = ctx.payouts.approve(request.uuid, now).await;

        assert!(
            matches!(approve, Err(PayoutsServiceError::AlreadyProcessed)),
            "expected AlreadyProcessed, got {approve:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_requests_are_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx
            .payouts
            .approve(PayoutRequestUuid::new(), Timestamp::now())
            .await;

        assert!(
            matches!(result, Err(PayoutsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn requests_are_listed_by_status_and_affiliate() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let first = register_affiliate(&ctx).await?;
        let second = register_affiliate(&ctx).await?;

        for (affiliate, charge) in [(&first, "ch_1"), (&second, "ch_2")] {
            onboard(&ctx, affiliate.uuid).await?;
            record_referral(&ctx, affiliate.uuid, charge, 4900, days_before(now, 30)).await?;
        }

        let older = ctx.payouts.request_payout(first.uuid, now).await?;

        ctx.payouts
            .reject(older.uuid, "needs review".to_string(), now)
            .await?;

        let newer = ctx.payouts.request_payout(first.uuid, now).await?;
        let other = ctx.payouts.request_payout(second.uuid, now).await?;

        let pending = ctx
            .payouts
            .list_payout_requests(PayoutRequestFilter::Status(PayoutStatus::Pending))
            .await?;

        let pending: Vec<_> = pending.iter().map(|request| request.uuid).collect();

        assert_eq!(pending, vec![newer.uuid, other.uuid]);

        let history = ctx
            .payouts
            .list_payout_requests(PayoutRequestFilter::Affiliate(first.uuid))
            .await?;

        let history: Vec<_> = history.iter().map(|request| request.uuid).collect();

        assert_eq!(history, vec![newer.uuid, older.uuid]);

        let missing = ctx
            .payouts
            .list_payout_requests(PayoutRequestFilter::Affiliate(AffiliateUuid::new()))
            .await;

        assert!(
            matches!(missing, Err(PayoutsServiceError::NotFound)),
            "expected NotFound, got {missing:?}"
        );

        Ok(())
    }
}
