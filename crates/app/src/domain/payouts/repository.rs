//! Payout Requests Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::{
    database::{amount_to_sql, try_get_amount},
    domain::{
        affiliates::records::AffiliateUuid,
        payouts::{
            data::NewPayoutRequest,
            records::{PayoutRequestRecord, PayoutRequestUuid, PayoutStatus},
        },
    },
};

const CREATE_PAYOUT_REQUEST_SQL: &str = include_str!("sql/create_payout_request.sql");
const GET_PAYOUT_REQUEST_SQL: &str = include_str!("sql/get_payout_request.sql");
const LIST_PENDING_PAYOUT_REQUESTS_SQL: &str = include_str!("sql/list_pending_payout_requests.sql");
const LIST_PAYOUT_REQUESTS_BY_STATUS_SQL: &str =
    include_str!("sql/list_payout_requests_by_status.sql");
const LIST_PAYOUT_REQUESTS_BY_AFFILIATE_SQL: &str =
    include_str!("sql/list_payout_requests_by_affiliate.sql");
const START_APPROVAL_SQL: &str = include_str!("sql/start_approval.sql");
const ABANDON_APPROVAL_SQL: &str = include_str!("sql/abandon_approval.sql");
const RECORD_TRANSFER_SQL: &str = include_str!("sql/record_transfer.sql");
const SETTLE_PAYOUT_REQUEST_SQL: &str = include_str!("sql/settle_payout_request.sql");
const REJECT_PAYOUT_REQUEST_SQL: &str = include_str!("sql/reject_payout_request.sql");

/// Partial unique index allowing one pending request per affiliate.
pub(crate) const ONE_PENDING_PER_AFFILIATE: &str = "payout_requests_one_pending_per_affiliate";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgPayoutRequestsRepository;

impl PgPayoutRequestsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    #[tracing::instrument(
        name = "payouts.repository.create_payout_request",
        skip(self, tx, request),
        fields(
            payout_request_uuid = %request.uuid,
            affiliate_uuid = %request.affiliate_uuid,
            amount = request.amount
        ),
        err
    )]
    pub(crate) async fn create_payout_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: &NewPayoutRequest,
    ) -> Result<PayoutRequestRecord, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(CREATE_PAYOUT_REQUEST_SQL)
            .bind(request.uuid)
            .bind(request.affiliate_uuid)
            .bind(amount_to_sql(request.amount, "amount")?)
            .bind(SqlxTimestamp::from(request.requested_at))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_payout_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
    ) -> Result<PayoutRequestRecord, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(GET_PAYOUT_REQUEST_SQL)
            .bind(request)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_pending_payout_requests(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<Vec<PayoutRequestRecord>, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(LIST_PENDING_PAYOUT_REQUESTS_SQL)
            .bind(affiliate)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_payout_requests_by_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        status: PayoutStatus,
    ) -> Result<Vec<PayoutRequestRecord>, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(LIST_PAYOUT_REQUESTS_BY_STATUS_SQL)
            .bind(status.as_str())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_payout_requests_by_affiliate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        affiliate: AffiliateUuid,
    ) -> Result<Vec<PayoutRequestRecord>, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(LIST_PAYOUT_REQUESTS_BY_AFFILIATE_SQL)
            .bind(affiliate)
            .fetch_all(&mut **tx)
            .await
    }

    /// Mark a pending request as being approved. `None` once it left `pending`.
    pub(crate) async fn start_approval(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
        started_at: Timestamp,
    ) -> Result<Option<PayoutRequestRecord>, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(START_APPROVAL_SQL)
            .bind(request)
            .bind(SqlxTimestamp::from(started_at))
            .fetch_optional(&mut **tx)
            .await
    }

    /// Clear the approval marker of a request whose transfer never happened.
    pub(crate) async fn abandon_approval(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(ABANDON_APPROVAL_SQL)
            .bind(request)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Keep the first transfer reference recorded for a pending request.
    ///
    /// Returns the stored reference, or `None` once the request left `pending`.
    #[tracing::instrument(
        name = "payouts.repository.record_transfer",
        skip(self, tx),
        fields(payout_request_uuid = %request),
        err
    )]
    pub(crate) async fn record_transfer(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
        reference: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        query_scalar(RECORD_TRANSFER_SQL)
            .bind(request)
            .bind(reference)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn settle_payout_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
        settled_at: Timestamp,
    ) -> Result<Option<PayoutRequestRecord>, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(SETTLE_PAYOUT_REQUEST_SQL)
            .bind(request)
            .bind(SqlxTimestamp::from(settled_at))
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn reject_payout_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: PayoutRequestUuid,
        reason: &str,
        rejected_at: Timestamp,
    ) -> Result<Option<PayoutRequestRecord>, sqlx::Error> {
        query_as::<Postgres, PayoutRequestRecord>(REJECT_PAYOUT_REQUEST_SQL)
            .bind(request)
            .bind(reason)
            .bind(SqlxTimestamp::from(rejected_at))
            .fetch_optional(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for PayoutRequestRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;

        let status = status
            .parse::<PayoutStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: row.try_get("uuid")?,
            affiliate_uuid: row.try_get("affiliate_uuid")?,
            amount: try_get_amount(row, "amount")?,
            status,
            rejection_reason: row.try_get("rejection_reason")?,
            transfer_reference: row.try_get("transfer_reference")?,
            approval_started_at: row
                .try_get::<Option<SqlxTimestamp>, _>("approval_started_at")?
                .map(SqlxTimestamp::to_jiff),
            requested_at: row.try_get::<SqlxTimestamp, _>("requested_at")?.to_jiff(),
            settled_at: row
                .try_get::<Option<SqlxTimestamp>, _>("settled_at")?
                .map(SqlxTimestamp::to_jiff),
            rejected_at: row
                .try_get::<Option<SqlxTimestamp>, _>("rejected_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}
