//! Database connection management

use sqlx::{
    PgPool, Postgres, Row, Transaction,
    error::ErrorKind,
    postgres::{PgPoolOptions, PgRow},
    query_scalar,
};
use uuid::Uuid;

use crate::domain::affiliates::records::AffiliateUuid;

/// SQL used to serialize writes for a single affiliate.
pub const LOCK_AFFILIATE_SQL: &str = "SELECT uuid FROM affiliates WHERE uuid = $1 FOR UPDATE";

#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a plain transaction.
    ///
    /// # Errors
    ///
    /// Returns an error when starting the transaction fails.
    pub async fn begin_transaction(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Begin a transaction holding the affiliate's row lock.
    ///
    /// Every mutation of an affiliate's ledger, aggregates or payout requests
    /// goes through here, so concurrent writers for the same affiliate queue
    /// up behind each other until commit or rollback.
    ///
    /// # Errors
    ///
    /// Returns [`sqlx::Error::RowNotFound`] when the affiliate does not exist,
    /// or an error when starting the transaction or taking the lock fails.
    pub async fn begin_affiliate_transaction(
        &self,
        affiliate: AffiliateUuid,
    ) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let _locked: Uuid = query_scalar(LOCK_AFFILIATE_SQL)
            .bind(affiliate)
            .fetch_one(&mut *tx)
            .await?;

        Ok(tx)
    }
}

/// Pool size for one-shot command line tools.
pub const CLI_MAX_CONNECTIONS: u32 = 2;

/// Connect to `PostgreSQL` with at most `max_connections` pooled connections.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(database_url)
        .await
}

/// Apply any pending schema migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Read a non-negative `BIGINT` column as cents.
pub(crate) fn try_get_amount(row: &PgRow, col: &str) -> Result<u64, sqlx::Error> {
    let amount_i64: i64 = row.try_get(col)?;

    u64::try_from(amount_i64).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Convert cents into the `BIGINT` representation used for binding.
pub(crate) fn amount_to_sql(amount: u64, col: &str) -> Result<i64, sqlx::Error> {
    i64::try_from(amount).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

/// Whether `error` is a unique violation of the named constraint or index.
pub(crate) fn violates_unique_constraint(error: &sqlx::Error, constraint: &str) -> bool {
    error.as_database_error().is_some_and(|db_error| {
        matches!(db_error.kind(), ErrorKind::UniqueViolation)
            && db_error.constraint() == Some(constraint)
    })
}
