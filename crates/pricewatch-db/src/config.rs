use pricewatch_core::AppError;
use pricewatch_core::pool::ResourceKind;

/// Default number of pooled storage connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Configuration for the storage connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: usize,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Result<Self, AppError> {
        self.max_connections = validate_max_connections(max_connections)?;
        Ok(self)
    }

    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 10, at most 10)
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigError("DATABASE_URL not set. Required for database operations.".into())
        })?;

        let config = Self::new(url);
        match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Err(_) => Ok(config),
            Ok(raw) => {
                let parsed: usize = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
                    ))
                })?;
                config.with_max_connections(parsed)
            }
        }
    }
}

fn validate_max_connections(value: usize) -> Result<usize, AppError> {
    let max = ResourceKind::StorageConnection.max_capacity();
    if value == 0 || value > max {
        return Err(AppError::ConfigError(format!(
            "DATABASE_MAX_CONNECTIONS must be between 1 and {max}, got {value}"
        )));
    }
    Ok(value)
}
