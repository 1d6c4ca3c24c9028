//! Affiliates Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::{
    database::{amount_to_sql, try_get_amount},
    domain::{
        affiliates::{
            data::NewAffiliate,
            records::{AffiliateRecord, AffiliateUuid},
        },
        referrals::data::LedgerTotals,
        users::UserUuid,
    },
};

const GET_AFFILIATE_SQL: &str = include_str!("sql/get_affiliate.sql");
const GET_AFFILIATE_BY_USER_SQL: &str = include_str!("sql/get_affiliate_by_user.sql");
const FIND_AFFILIATE_BY_CODE_SQL: &str = include_str!("sql/find_affiliate_by_code.sql");
const CREATE_AFFILIATE_SQL: &str = include_str!("sql/create_affiliate.sql");
const SET_PAYOUT_DESTINATION_SQL: &str = include_str!("sql/set_payout_destination.sql");
const MARK_ONBOARDED_SQL: &str = include_str!("sql/mark_onboarded.sql");
const DEACTIVATE_AFFILIATE_SQL: &str = include_str!("sql/deactivate_affiliate.sql");
const RECORD_EARNING_SQL: &str = include_str!("sql/record_earning.sql");
const RECORD_PAYOUT_SQL: &str = include_str!("sql/record_payout.sql");
const OVERWRITE_AGGREGATES_SQL: &str = include_str!("sql/overwrite_aggregates.sql");

/// Name of the unique constraint on referral codes.
pub(crate) const REFERRAL_CODE_CONSTRAINT: &str = "affiliates_referral_code_key";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgAffiliatesRepository;

impl PgAffiliatesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_affiliate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<AffiliateRecord, sqlx::Error> {
        query_as::<Postgres, AffiliateRecord>(GET_AFFILIATE_SQL)
            .bind(affiliate)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_affiliate_by_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Option<AffiliateRecord>, sqlx::Error> {
        query_as::<Postgres, AffiliateRecord>(GET_AFFILIATE_BY_USER_SQL)
            .bind(user)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn find_affiliate_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<AffiliateRecord>, sqlx::Error> {
        query_as::<Postgres, AffiliateRecord>(FIND_AFFILIATE_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Insert a new affiliate.
    ///
    /// Returns `None` when the user already has an affiliate. A clashing
    /// referral code surfaces as a unique violation on
    /// [`REFERRAL_CODE_CONSTRAINT`].
    #[tracing::instrument(
        name = "affiliates.repository.create_affiliate",
        skip(self, tx, affiliate),
        fields(user_uuid = %affiliate.user_uuid),
        err
    )]
    pub(crate) async fn create_affiliate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: &NewAffiliate,
    ) -> Result<Option<AffiliateRecord>, sqlx::Error> {
        query_as::<Postgres, AffiliateRecord>(CREATE_AFFILIATE_SQL)
            .bind(affiliate.uuid)
            .bind(affiliate.user_uuid)
            .bind(&affiliate.referral_code)
            .bind(i16::from(affiliate.commission_rate))
            .fetch_optional(&mut **tx)
            .await
    }

    /// Store the destination id unless one is already present, returning
    /// whichever id the row ends up holding.
    pub(crate) async fn set_payout_destination(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
        destination_id: &str,
    ) -> Result<String, sqlx::Error> {
        let stored: Option<String> = query_scalar(SET_PAYOUT_DESTINATION_SQL)
            .bind(affiliate)
            .bind(destination_id)
            .fetch_one(&mut **tx)
            .await?;

        stored.ok_or(sqlx::Error::RowNotFound)
    }

    /// Flip the onboarded flag. Returns `true` only for the call that flipped it.
    pub(crate) async fn mark_onboarded(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(MARK_ONBOARDED_SQL)
            .bind(affiliate)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }

    pub(crate) async fn deactivate_affiliate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<AffiliateRecord, sqlx::Error> {
        query_as::<Postgres, AffiliateRecord>(DEACTIVATE_AFFILIATE_SQL)
            .bind(affiliate)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn record_earning(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
        commission: u64,
    ) -> Result<(), sqlx::Error> {
        update_one(
            tx,
            query(RECORD_EARNING_SQL)
                .bind(affiliate)
                .bind(amount_to_sql(commission, "total_earned")?),
        )
        .await
    }

    pub(crate) async fn record_payout(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
        amount: u64,
    ) -> Result<(), sqlx::Error> {
        update_one(
            tx,
            query(RECORD_PAYOUT_SQL)
                .bind(affiliate)
                .bind(amount_to_sql(amount, "total_paid")?),
        )
        .await
    }

    pub(crate) async fn overwrite_aggregates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
        totals: &LedgerTotals,
    ) -> Result<(), sqlx::Error> {
        update_one(
            tx,
            query(OVERWRITE_AGGREGATES_SQL)
                .bind(affiliate)
                .bind(amount_to_sql(totals.earned, "total_earned")?)
                .bind(amount_to_sql(totals.paid, "total_paid")?)
                .bind(amount_to_sql(totals.referral_count, "referral_count")?),
        )
        .await
    }
}

async fn update_one(
    tx: &mut Transaction<'_, Postgres>,
    statement: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
) -> Result<(), sqlx::Error> {
    let rows_affected = statement.execute(&mut **tx).await?.rows_affected();

    if rows_affected == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    Ok(())
}

impl<'r> FromRow<'r, PgRow> for AffiliateRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let commission_rate: i16 = row.try_get("commission_rate")?;

        let commission_rate =
            u8::try_from(commission_rate).map_err(|e| sqlx::Error::ColumnDecode {
                index: "commission_rate".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: row.try_get("uuid")?,
            user_uuid: row.try_get("user_uuid")?,
            referral_code: row.try_get("referral_code")?,
            commission_rate,
            payout_destination_id: row.try_get("payout_destination_id")?,
            payout_onboarded: row.try_get("payout_onboarded")?,
            is_active: row.try_get("is_active")?,
            total_earned: try_get_amount(row, "total_earned")?,
            total_paid: try_get_amount(row, "total_paid")?,
            referral_count: try_get_amount(row, "referral_count")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
