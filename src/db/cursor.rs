//! Named crawl cursors.
//!
//! A cursor is stored as an RFC 3339 timestamp with full sub-second
//! precision, so a value read back compares equal to the value written.

use crate::catalog::CursorStore;
use crate::error::DatabaseError;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

use super::Database;

impl Database {
    /// Get the cursor saved under `name`, or `None` if it was never written
    pub async fn get_cursor(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM catalog_cursor WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read cursor {}: {}",
                        name, e
                    )))
                })?;

        value
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        Error::Database(DatabaseError::CorruptValue(format!(
                            "cursor {} holds {:?}: {}",
                            name, raw, e
                        )))
                    })
            })
            .transpose()
    }

    /// Save `value` as the cursor named `name`, replacing any previous value
    pub async fn set_cursor(&self, name: &str, value: DateTime<Utc>) -> Result<()> {
        let now = Utc::now().timestamp();
        let encoded = value.to_rfc3339_opts(SecondsFormat::AutoSi, true);

        sqlx::query(
            r#"
            INSERT INTO catalog_cursor (name, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(&encoded)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to save cursor {}: {}",
                name, e
            )))
        })?;

        Ok(())
    }
}

/// [`CursorStore`] backed by one named row of the cursor table
#[derive(Clone)]
pub struct DatabaseCursor {
    db: Arc<Database>,
    name: String,
}

impl DatabaseCursor {
    /// Cursor stored under `name`
    pub fn new(db: Arc<Database>, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }
}

#[async_trait]
impl CursorStore for DatabaseCursor {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        self.db.get_cursor(&self.name).await
    }

    async fn save(&self, value: DateTime<Utc>) -> Result<()> {
        self.db.set_cursor(&self.name, value).await?;
        tracing::debug!(cursor = %self.name, value = %value, "cursor saved");
        Ok(())
    }
}
