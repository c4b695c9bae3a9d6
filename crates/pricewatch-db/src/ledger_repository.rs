use chrono::NaiveDate;
use pricewatch_core::error::AppError;
use pricewatch_core::models::FailureRecord;
use pricewatch_core::traits::LedgerStore;

use crate::connections::Connections;

/// PostgreSQL-backed failure ledger.
///
/// Each mutation is a single statement, so concurrent workers (and concurrent
/// processes) never lose an update.
#[derive(Clone)]
pub struct LedgerRepository {
    connections: Connections,
}

impl LedgerRepository {
    pub fn new(connections: Connections) -> Self {
        Self { connections }
    }
}

#[derive(sqlx::FromRow)]
struct FailureRow {
    key: String,
    failure_count: i32,
    last_failure_date: Option<NaiveDate>,
    consecutive_days: i32,
    last_success_date: Option<NaiveDate>,
}

impl From<FailureRow> for FailureRecord {
    fn from(row: FailureRow) -> Self {
        FailureRecord {
            key: row.key,
            failure_count: row.failure_count.max(0) as u32,
            last_failure_date: row.last_failure_date,
            consecutive_days: row.consecutive_days.max(0) as u32,
            last_success_date: row.last_success_date,
        }
    }
}

impl LedgerStore for LedgerRepository {
    async fn record_failure(&self, key: &str, today: NaiveDate) -> Result<FailureRecord, AppError> {
        let mut conn = self.connections.acquire().await?;
        let row = sqlx::query_as::<_, FailureRow>(
            r#"
            INSERT INTO failure_records (key, failure_count, last_failure_date, consecutive_days)
            VALUES ($1, 1, $2, 1)
            ON CONFLICT (key) DO UPDATE SET
                failure_count = failure_records.failure_count + 1,
                consecutive_days = CASE
                    WHEN failure_records.last_failure_date = $2::date - 1
                        THEN failure_records.consecutive_days + 1
                    WHEN failure_records.last_failure_date = $2::date
                        THEN GREATEST(failure_records.consecutive_days, 1)
                    ELSE 1
                END,
                last_failure_date = $2,
                updated_at = NOW()
            RETURNING key, failure_count, last_failure_date, consecutive_days, last_success_date
            "#,
        )
        .bind(key)
        .bind(today)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    async fn record_success(&self, key: &str, today: NaiveDate) -> Result<(), AppError> {
        let mut conn = self.connections.acquire().await?;
        sqlx::query(
            r#"
            UPDATE failure_records
            SET failure_count = 0,
                consecutive_days = 0,
                last_success_date = $2,
                updated_at = NOW()
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(today)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<FailureRecord>, AppError> {
        let mut conn = self.connections.acquire().await?;
        let row = sqlx::query_as::<_, FailureRow>(
            r#"
            SELECT key, failure_count, last_failure_date, consecutive_days, last_success_date
            FROM failure_records
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list_streaks(&self, min_consecutive_days: u32) -> Result<Vec<FailureRecord>, AppError> {
        let mut conn = self.connections.acquire().await?;
        let rows = sqlx::query_as::<_, FailureRow>(
            r#"
            SELECT key, failure_count, last_failure_date, consecutive_days, last_success_date
            FROM failure_records
            WHERE consecutive_days >= $1
            ORDER BY consecutive_days DESC, key
            "#,
        )
        .bind(min_consecutive_days as i32)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
