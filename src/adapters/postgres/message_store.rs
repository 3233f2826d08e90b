//! PostgreSQL implementation of MessageStore.
//!
//! Expects the table:
//!
//! ```sql
//! CREATE TABLE messages (
//!     id          UUID PRIMARY KEY,
//!     room        TEXT NOT NULL,
//!     username    TEXT NOT NULL,
//!     content     TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL
//! );
//! ```

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::chat::Message;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::MessageStore;

/// PostgreSQL implementation of MessageStore.
#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Creates a new PostgresMessageStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a lazily-connecting pool from configuration.
    ///
    /// No connection is attempted here; an unreachable database surfaces as
    /// failed saves, which the gateway logs and otherwise ignores.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy(&config.url)
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid database configuration: {}", e),
                )
            })?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn save_message(&self, message: &Message) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, room, username, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id().as_uuid())
        .bind(message.room().as_str())
        .bind(message.user().as_str())
        .bind(message.content())
        .bind(message.created_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert message: {}", e),
            )
            .with_detail("message_id", message.id().to_string())
        })?;

        Ok(())
    }
}
