//! Checkpoint storage repository.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use crate::Result;
use crate::source::SourceId;

/// Repository for durable per-source checkpoints.
pub struct CheckpointRepository {
    pool: SqlitePool,
}

impl CheckpointRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Closes the connection pool. Later queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS checkpoints (
                source_id TEXT PRIMARY KEY,
                checkpoint TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store the checkpoint for a source.
    ///
    /// An existing checkpoint is only replaced by a later one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, source: &SourceId, checkpoint: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO checkpoints (source_id, checkpoint, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                checkpoint = excluded.checkpoint,
                updated_at = excluded.updated_at
            WHERE excluded.checkpoint > checkpoints.checkpoint
            ",
        )
        .bind(source.as_str())
        .bind(encode_timestamp(checkpoint))
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the stored checkpoint for a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, source: &SourceId) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r"
            SELECT checkpoint FROM checkpoints WHERE source_id = ?
            ",
        )
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| decode_timestamp(&row.get::<String, _>("checkpoint"))))
    }

    /// Load every stored checkpoint.
    ///
    /// Rows with an unreadable timestamp are skipped, which sends that
    /// source back to the initial lookback.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load_all(&self) -> Result<HashMap<SourceId, DateTime<Utc>>> {
        let rows = sqlx::query(
            r"
            SELECT source_id, checkpoint FROM checkpoints
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let checkpoints = rows
            .iter()
            .filter_map(|row| {
                let source_id: String = row.get("source_id");
                let raw: String = row.get("checkpoint");
                match decode_timestamp(&raw) {
                    Some(checkpoint) => Some((SourceId::new(source_id), checkpoint)),
                    None => {
                        warn!(source = %source_id, value = %raw, "Ignoring unreadable checkpoint");
                        None
                    }
                }
            })
            .collect();

        Ok(checkpoints)
    }
}

/// Fixed-width RFC 3339 so stored values order correctly as text.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
