use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};

/// Key/value row in the `app_config` table.
#[derive(Debug, Clone, FromRow)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for application configuration values. The AbacatePay API
/// key lives here under `abacate_api_key`.
pub struct ConfigRepository {
    pool: PgPool,
}

impl ConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let entry = sqlx::query_as::<_, ConfigEntry>(
            "SELECT key, value, updated_at
             FROM app_config
             WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(entry.map(|e| e.value))
    }

    /// Insert-or-replace by key name.
    pub async fn upsert_value(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO app_config (key, value, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (key)
             DO UPDATE SET value = $2, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
