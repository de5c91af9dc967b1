//! Relational snapshot storage (Postgres)
//!
//! One row per snapshot id:
//! `(id text primary key, data jsonb, updated_at timestamptz, created_at timestamptz)`.

use super::backend::SnapshotBackend;
use crate::config::PostgresConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::OnceCell;

const NAME: &str = "postgres";

/// Postgres snapshot backend; the pool connects on first use
pub struct PostgresBackend {
    pool: PgPool,
    table: String,
    id: String,
    schema_ready: OnceCell<()>,
}

impl PostgresBackend {
    /// Build a lazily connecting pool for `config`
    pub fn new(config: &PostgresConfig, timeout: Duration) -> Result<Self> {
        if !is_identifier(&config.table) {
            return Err(Error::Config(format!(
                "remote.postgres.table '{}' is not a plain identifier",
                config.table
            )));
        }
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect_lazy(&config.url)?;
        Ok(Self {
            pool,
            table: config.table.clone(),
            id: config.id.clone(),
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                let ddl = format!(
                    "CREATE TABLE IF NOT EXISTS {} (
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)",
                    self.table
                );
                sqlx::query(&ddl).execute(&self.pool).await?;
                Ok::<_, Error>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotBackend for PostgresBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn load(&self) -> Result<Option<Bytes>> {
        self.ensure_schema().await?;
        let sql = format!("SELECT data FROM {} WHERE id = $1", self.table);
        let row: Option<(serde_json::Value,)> = sqlx::query_as(&sql)
            .bind(self.id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(data,)| serde_json::to_vec(&data).map(Bytes::from))
            .transpose()
            .map_err(Error::from)
    }

    async fn save(&self, data: Bytes) -> Result<()> {
        self.ensure_schema().await?;
        let value: serde_json::Value = serde_json::from_slice(&data)?;
        let sql = format!(
            "INSERT INTO {} (id, data, updated_at, created_at)
VALUES ($1, $2, now(), now())
ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
            self.table
        );
        sqlx::query(&sql)
            .bind(self.id.as_str())
            .bind(sqlx::types::Json(value))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
