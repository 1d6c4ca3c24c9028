//! Referrals Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::{
    database::{amount_to_sql, try_get_amount},
    domain::{
        affiliates::records::AffiliateUuid,
        payouts::records::PayoutRequestUuid,
        referrals::{
            data::{LedgerTotals, NewReferral},
            records::{ReferralRecord, ReferralStatus, ReferralUuid},
        },
    },
};

const CREATE_REFERRAL_SQL: &str = include_str!("sql/create_referral.sql");
const LIST_PENDING_REFERRALS_SQL: &str = include_str!("sql/list_pending_referrals.sql");
const LIST_REFERRALS_SQL: &str = include_str!("sql/list_referrals.sql");
const RESERVE_REFERRALS_SQL: &str = include_str!("sql/reserve_referrals.sql");
const LIST_RESERVED_REFERRALS_SQL: &str = include_str!("sql/list_reserved_referrals.sql");
const RELEASE_RESERVED_REFERRALS_SQL: &str = include_str!("sql/release_reserved_referrals.sql");
const MARK_REFERRALS_PAID_SQL: &str = include_str!("sql/mark_referrals_paid.sql");
const LEDGER_TOTALS_SQL: &str = include_str!("sql/ledger_totals.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgReferralsRepository;

impl PgReferralsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Append a commission event.
    ///
    /// Returns `None` when the subscription charge is already in the ledger.
    #[tracing::instrument(
        name = "referrals.repository.create_referral",
        skip(self, tx, referral),
        fields(
            affiliate_uuid = %referral.affiliate_uuid,
            subscription_charge_id = %referral.subscription_charge_id
        ),
        err
    )]
    pub(crate) async fn create_referral(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        referral: &NewReferral,
        commission_amount: u64,
    ) -> Result<Option<ReferralRecord>, sqlx::Error> {
        query_as::<Postgres, ReferralRecord>(CREATE_REFERRAL_SQL)
            .bind(referral.uuid)
            .bind(referral.affiliate_uuid)
            .bind(referral.referred_user_uuid)
            .bind(&referral.subscription_charge_id)
            .bind(amount_to_sql(referral.charge_amount, "charge_amount")?)
            .bind(amount_to_sql(commission_amount, "commission_amount")?)
            .bind(SqlxTimestamp::from(referral.recorded_at))
            .bind(SqlxTimestamp::from(referral.charged_at))
            .fetch_optional(&mut **tx)
            .await
    }

    /// Pending referrals, oldest first.
    pub(crate) async fn list_pending_referrals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<Vec<ReferralRecord>, sqlx::Error> {
        query_as::<Postgres, ReferralRecord>(LIST_PENDING_REFERRALS_SQL)
            .bind(affiliate)
            .fetch_all(&mut **tx)
            .await
    }

    /// Most recent referrals, newest first.
    pub(crate) async fn list_referrals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
        limit: u32,
    ) -> Result<Vec<ReferralRecord>, sqlx::Error> {
        query_as::<Postgres, ReferralRecord>(LIST_REFERRALS_SQL)
            .bind(affiliate)
            .bind(i64::from(limit))
            .fetch_all(&mut **tx)
            .await
    }

    /// Tie pending, unreserved referrals to a payout request, returning how
    /// many rows changed.
    ///
    /// The reserved set is what the request pays; referrals recorded later,
    /// whatever their clearance date, are never swept in.
    #[tracing::instrument(
        name = "referrals.repository.reserve_for_payout",
        skip(self, tx, referrals),
        fields(payout_request_uuid = %request, referral_count = referrals.len()),
        err
    )]
    pub(crate) async fn reserve_for_payout(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        referrals: &[ReferralUuid],
        request: PayoutRequestUuid,
    ) -> Result<u64, sqlx::Error> {
        let uuids: Vec<Uuid> = referrals.iter().map(|uuid| uuid.into_uuid()).collect();

        let rows_affected = query(RESERVE_REFERRALS_SQL)
            .bind(uuids)
            .bind(request)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Pending referrals reserved by a payout request, oldest first.
    pub(crate) async fn list_reserved_referrals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
    ) -> Result<Vec<ReferralRecord>, sqlx::Error> {
        query_as::<Postgres, ReferralRecord>(LIST_RESERVED_REFERRALS_SQL)
            .bind(request)
            .fetch_all(&mut **tx)
            .await
    }

    /// Return a rejected request's referrals to the unreserved pool.
    pub(crate) async fn release_reserved_referrals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(RELEASE_RESERVED_REFERRALS_SQL)
            .bind(request)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Move referrals reserved by `request` to paid, returning how many rows
    /// changed.
    ///
    /// Only payout settlement calls this, inside its own transaction; callers
    /// must treat a count short of `referrals.len()` as a failed settlement.
    #[tracing::instrument(
        name = "referrals.repository.mark_paid",
        skip(self, tx, referrals),
        fields(payout_request_uuid = %request, referral_count = referrals.len()),
        err
    )]
    pub(crate) async fn mark_paid(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
        referrals: &[ReferralUuid],
        paid_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let uuids: Vec<Uuid> = referrals.iter().map(|uuid| uuid.into_uuid()).collect();

        let rows_affected = query(MARK_REFERRALS_PAID_SQL)
            .bind(uuids)
            .bind(request)
            .bind(SqlxTimestamp::from(paid_at))
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn ledger_totals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<LedgerTotals, sqlx::Error> {
        let row = query(LEDGER_TOTALS_SQL)
            .bind(affiliate)
            .fetch_one(&mut **tx)
            .await?;

        Ok(LedgerTotals {
            earned: try_get_amount(&row, "earned")?,
            paid: try_get_amount(&row, "paid")?,
            referral_count: try_get_amount(&row, "referral_count")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for ReferralRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;

        let status = status
            .parse::<ReferralStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: row.try_get("uuid")?,
            affiliate_uuid: row.try_get("affiliate_uuid")?,
            referred_user_uuid: row.try_get("referred_user_uuid")?,
            subscription_charge_id: row.try_get("subscription_charge_id")?,
            charge_amount: try_get_amount(row, "charge_amount")?,
            commission_amount: try_get_amount(row, "commission_amount")?,
            status,
            paid_at: row
                .try_get::<Option<SqlxTimestamp>, _>("paid_at")?
                .map(SqlxTimestamp::to_jiff),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
