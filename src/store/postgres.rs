//! Durable record store backed by the `weather_records` Postgres table.
//!
//! Each put is a single-row upsert, so readers see either the previous or the
//! new payload and nothing in between.

use super::{RecordStore, StoreError};
use crate::payload::Payload;
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations for the records table.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn put(&self, key: &str, payload: Payload) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO weather_records (key, payload)
            VALUES ($1, $2)
            ON CONFLICT (key)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(payload.as_bytes())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Payload, StoreError> {
        let row: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT payload FROM weather_records WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payload::from).ok_or_else(|| StoreError::NotFound {
            key: key.to_owned(),
        })
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
