use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::StorageConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection and schema bootstrap for the Postgres backend
pub struct DatabaseManager;

impl DatabaseManager {
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS smart_office_items (
            collection TEXT NOT NULL,
            pk TEXT NOT NULL,
            sk TEXT NOT NULL,
            item JSONB NOT NULL,
            PRIMARY KEY (collection, pk, sk)
        )
    "#;

    /// Open a pool against `DATABASE_URL` and make sure the item table exists
    pub async fn connect(config: &StorageConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;

        Self::ensure_schema(&pool).await?;
        info!("Connected to Postgres ({} max connections)", config.max_connections);
        Ok(pool)
    }

    pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query(Self::SCHEMA).execute(pool).await?;
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
