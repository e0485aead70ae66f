//! Postgres-backed owner store.
//!
//! Owner records live in a `personas` table with a JSONB `metadata` column:
//!
//! ```sql
//! CREATE TABLE personas (id UUID PRIMARY KEY, metadata JSONB NOT NULL DEFAULT '{}'::jsonb);
//! ```
//!
//! Writes replace the whole column; merging happens in
//! [`crate::persister::ResultPersister`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use personaforge_core::{Metadata, OwnerId};

use super::{OwnerStore, OwnerStoreError};

pub struct PostgresOwnerStore {
    pool: PgPool,
}

impl PostgresOwnerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, OwnerStoreError> {
        let pool = PgPool::connect(database_url).await.map_err(storage)?;
        Ok(Self::new(pool))
    }

    /// Create the owner table if it does not exist (dev convenience).
    pub async fn ensure_schema(&self) -> Result<(), OwnerStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS personas (
                id UUID PRIMARY KEY,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> OwnerStoreError {
    OwnerStoreError::Storage(e.to_string())
}

#[async_trait]
impl OwnerStore for PostgresOwnerStore {
    async fn load(&self, owner_id: OwnerId) -> Result<Option<Metadata>, OwnerStoreError> {
        let row = sqlx::query("SELECT metadata FROM personas WHERE id = $1")
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(value): Json<JsonValue> = row.try_get("metadata").map_err(storage)?;
        Ok(Some(match value {
            JsonValue::Object(map) => map,
            _ => Metadata::new(),
        }))
    }

    async fn store(&self, owner_id: OwnerId, metadata: Metadata) -> Result<(), OwnerStoreError> {
        let result = sqlx::query("UPDATE personas SET metadata = $2 WHERE id = $1")
            .bind(owner_id.as_uuid())
            .bind(Json(JsonValue::Object(metadata)))
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(OwnerStoreError::NotFound(owner_id));
        }
        Ok(())
    }

    async fn owners(&self) -> Result<Vec<OwnerId>, OwnerStoreError> {
        let rows = sqlx::query("SELECT id FROM personas")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("id")
                    .map(OwnerId::from_uuid)
                    .map_err(storage)
            })
            .collect()
    }
}
