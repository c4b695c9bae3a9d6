use pricewatch_core::AppError;

use crate::config::DatabaseConfig;
use crate::connections::Connections;
use crate::item_repository::ItemRepository;
use crate::ledger_repository::LedgerRepository;

/// Central database facade: owns the connection pool, runs migrations,
/// and vends repository instances.
///
/// Connections are held in a [`Connections`] pool, so every repository call
/// checks one out exclusively and returns it when the call ends.
#[derive(Clone)]
pub struct Database {
    connections: Connections,
}

impl Database {
    /// Open up to `config.max_connections` connections.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let connections = Connections::open(&config.url, config.max_connections).await?;
        Ok(Self { connections })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_connections(connections: Connections) -> Self {
        Self { connections }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        let mut conn = self.connections.acquire().await?;
        sqlx::migrate!("../../migrations")
            .run(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get an [`ItemRepository`] backed by this pool.
    pub fn item_repo(&self) -> ItemRepository {
        ItemRepository::new(self.connections.clone())
    }

    /// Get a [`LedgerRepository`] backed by this pool.
    pub fn ledger_repo(&self) -> LedgerRepository {
        LedgerRepository::new(self.connections.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Close the pool and every idle connection in it.
    pub async fn close(&self) {
        self.connections.close().await;
    }
}
