use std::str::FromStr;
use std::time::Duration;

use skyvault_core::{TicketError, TicketResult};
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::app_config::StoreConfig;
use crate::ticket_repo::SqliteTicketRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Settings key holding the credential used by the document-ingestion service.
pub const EXTRACTION_API_KEY: &str = "extraction_api_key";

pub(crate) fn db_error(err: sqlx::Error) -> TicketError {
    TicketError::Persistence(err.to_string())
}

fn migrate_error(err: MigrateError) -> TicketError {
    TicketError::Persistence(format!("Migration failed: {}", err))
}

/// Highest schema version this build knows how to apply.
pub fn latest_schema_version() -> i64 {
    MIGRATOR.iter().map(|m| m.version).max().unwrap_or(0)
}

#[derive(Clone)]
pub struct DbClient {
    pub pool: SqlitePool,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> TicketResult<Self> {
        let options = SqliteConnectOptions::from_str(connection_string)
            .map_err(db_error)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = connection_string.contains(":memory:") || connection_string.contains("mode=memory");
        let pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(3));
        // Each connection to an in-memory database gets its own empty database,
        // so the pool must hold exactly one connection for its whole life.
        let pool_options = if in_memory {
            pool_options.max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(db_error)?;
        Ok(Self { pool })
    }

    /// Fresh, migrated, throwaway database.
    pub async fn in_memory() -> TicketResult<Self> {
        let client = Self::new("sqlite::memory:", 1).await?;
        client.migrate().await?;
        Ok(client)
    }

    /// Opens the configured database, migrates it and seeds demo rows when asked.
    pub async fn connect(config: &StoreConfig) -> TicketResult<Self> {
        let client = Self::new(&config.database_url, config.max_connections).await?;
        client.migrate().await?;
        if config.seed_demo_data {
            crate::seed::seed_demo_if_empty(&client.tickets()).await?;
        }
        Ok(client)
    }

    pub fn tickets(&self) -> SqliteTicketRepository {
        SqliteTicketRepository::new(self.pool.clone())
    }

    /// Applies pending migrations. A database carrying a migration this build
    /// does not know about is rejected rather than touched.
    pub async fn migrate(&self) -> TicketResult<()> {
        info!("Running database migrations...");
        MIGRATOR.run(&self.pool).await.map_err(migrate_error)?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub async fn schema_version(&self) -> TicketResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    pub async fn get_setting(&self, key: &str) -> TicketResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    pub async fn put_setting(&self, key: &str, value: &str) -> TicketResult<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
