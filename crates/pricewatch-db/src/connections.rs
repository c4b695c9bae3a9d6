use std::sync::Arc;

use pricewatch_core::AppError;
use pricewatch_core::pool::{ResourceKind, ResourcePool, Slot};
use sqlx::{Connection, PgConnection};

/// Pooled PostgreSQL connections that are checked before use.
///
/// Every checkout pings the connection. A connection that fails the ping is
/// replaced with a freshly opened one, so a dropped socket costs one reconnect
/// instead of failing every later query on that slot.
#[derive(Clone)]
pub struct Connections {
    pool: ResourcePool<PgConnection>,
    url: Arc<str>,
}

impl Connections {
    /// Open up to `capacity` connections to `url`.
    ///
    /// Connections that fail to open are skipped; it is an error only if none
    /// could be opened.
    pub async fn open(url: &str, capacity: usize) -> Result<Self, AppError> {
        let pool = ResourcePool::build(ResourceKind::StorageConnection, capacity, |index| {
            async move {
                PgConnection::connect(url).await.map_err(|e| {
                    AppError::DatabaseError(format!("Failed to connect (slot {index}): {e}"))
                })
            }
        })
        .await?;

        Ok(Self::new(pool, url))
    }

    pub fn new(pool: ResourcePool<PgConnection>, url: impl Into<Arc<str>>) -> Self {
        Self {
            pool,
            url: url.into(),
        }
    }

    /// Check out a live connection.
    ///
    /// If the reconnect fails too, the stale connection goes back to the pool
    /// (the next checkout tries again) and the error is returned.
    pub async fn acquire(&self) -> Result<Slot<PgConnection>, AppError> {
        let mut conn = self.pool.acquire().await?;
        if let Err(e) = conn.ping().await {
            tracing::warn!(error = %e, "Storage connection failed health check, reconnecting");
            let fresh = PgConnection::connect(&self.url)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to reconnect: {e}")))?;
            // The old socket is already dead; dropping it is enough.
            drop(conn.replace(fresh));
        }
        Ok(conn)
    }

    pub fn pool(&self) -> &ResourcePool<PgConnection> {
        &self.pool
    }

    /// Close the pool and every idle connection in it.
    pub async fn close(&self) {
        for conn in self.pool.close_all() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "Failed to close database connection");
            }
        }
    }
}
