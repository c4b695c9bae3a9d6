use pricewatch_core::error::AppError;
use pricewatch_core::job::{JobFilter, JobReference, Observation};
use pricewatch_core::models::ItemContext;
use pricewatch_core::traits::{ItemDirectory, JobSource, ObservationStore};

use crate::connections::Connections;

/// PostgreSQL-backed item table: the job source, the observation store and
/// the item directory used for alert context.
#[derive(Clone)]
pub struct ItemRepository {
    connections: Connections,
}

impl ItemRepository {
    pub fn new(connections: Connections) -> Self {
        Self { connections }
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct JobRow {
    key: String,
    locator: String,
}

#[derive(sqlx::FromRow)]
struct ContextRow {
    name: String,
    image_url: Option<String>,
    groups: Vec<String>,
}

impl JobSource for ItemRepository {
    /// One job per distinct locator, keyed by the lowest item key sharing it.
    ///
    /// Items listed under the same page are fetched once per cycle; the
    /// observation for the job is written to all of them.
    async fn eligible_jobs(&self, filter: &JobFilter) -> Result<Vec<JobReference>, AppError> {
        let mut conn = self.connections.acquire().await?;
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT MIN(key) AS key, locator
            FROM items
            WHERE NOT is_deleted
              AND (NOT $1 OR NOT is_manually_priced)
            GROUP BY locator
            ORDER BY 1
            LIMIT $2
            "#,
        )
        .bind(filter.exclude_manually_priced)
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| JobReference::new(row.key, row.locator))
            .collect())
    }
}

impl ObservationStore for ItemRepository {
    async fn update_observation(&self, observation: &Observation) -> Result<(), AppError> {
        let mut conn = self.connections.acquire().await?;
        // A NULL value leaves price and priced_at alone and only marks the attempt.
        // Siblings sharing the locator follow the job's item, except deleted and
        // hand-priced ones.
        let result = sqlx::query(
            r#"
            UPDATE items
            SET price = COALESCE($2, price),
                priced_at = CASE WHEN $2 IS NULL THEN priced_at ELSE NOW() END,
                last_attempted_at = NOW()
            WHERE locator = (SELECT locator FROM items WHERE key = $1)
              AND (key = $1 OR (NOT is_deleted AND NOT is_manually_priced))
            "#,
        )
        .bind(&observation.key)
        .bind(observation.value)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(format!(
                "No item with key {}",
                observation.key
            )));
        }
        Ok(())
    }
}

impl ItemDirectory for ItemRepository {
    async fn describe(&self, key: &str) -> Result<Option<ItemContext>, AppError> {
        let mut conn = self.connections.acquire().await?;
        let row = sqlx::query_as::<_, ContextRow>(
            r#"
            SELECT i.name,
                   i.image_url,
                   COALESCE(
                       array_agg(g.group_name ORDER BY g.group_name)
                           FILTER (WHERE g.group_name IS NOT NULL),
                       '{}'
                   ) AS groups
            FROM items i
            LEFT JOIN item_groups g ON g.item_key = i.key
            WHERE i.key = $1
            GROUP BY i.key, i.name, i.image_url
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(|row| ItemContext {
            name: row.name,
            image: row.image_url,
            groups: row.groups,
        }))
    }
}
