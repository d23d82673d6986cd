//! Document storage repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, warn};

use super::model::{SessionCredentials, StoredDocument};
use crate::readiness::ActivityCallback;
use crate::sink::{ImportOptions, ImportSummary, IngestionSink, SinkError, SourceLookup};
use crate::snapshot::{Block, DocumentId, DocumentSnapshot, ObjectType};

/// Schema statements, applied in order on every open.
const SCHEMA: [&str; 3] = [
    r"
    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        object_type TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        blocks_json TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        original_created_at TEXT,
        imported_at TEXT NOT NULL,
        revision INTEGER NOT NULL DEFAULT 1
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(account_id, source)
    ",
];

/// What a single upsert did.
enum Upsert {
    Created,
    Updated,
    Skipped,
}

/// `SQLite` document store bound to one account.
pub struct DocumentStore {
    pool: SqlitePool,
    account_id: String,
    activity: Option<ActivityCallback>,
}

impl DocumentStore {
    /// Opens (creating if needed) the store at `database_path`.
    ///
    /// The first open records the account id and a fingerprint of the
    /// secret; later opens must present the same pair. Every schema step and
    /// every later write invokes `activity`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Session`] if the store belongs to another account
    /// or the secret does not match, and a database error if the schema
    /// cannot be created.
    pub async fn open(
        database_path: &str,
        session: &SessionCredentials,
        activity: Option<ActivityCallback>,
    ) -> Result<Self, SinkError> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self {
            pool,
            account_id: session.account_id().to_string(),
            activity,
        };
        store.initialize().await?;
        store.bind_session(session).await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(session: &SessionCredentials) -> Result<Self, SinkError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self {
            pool,
            account_id: session.account_id().to_string(),
            activity: None,
        };
        store.initialize().await?;
        store.bind_session(session).await?;
        Ok(store)
    }

    /// The account this store is bound to.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<(), SinkError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
            self.signal();
        }
        Ok(())
    }

    /// Records or verifies the account and secret this store belongs to.
    async fn bind_session(&self, session: &SessionCredentials) -> Result<(), SinkError> {
        let fingerprint = session.fingerprint();
        let stored_account = self.meta("account_id").await?;
        let stored_fingerprint = self.meta("secret_fingerprint").await?;
        self.signal();

        match (stored_account, stored_fingerprint) {
            (None, None) => {
                sqlx::query("INSERT INTO store_meta (key, value) VALUES ('account_id', ?), ('secret_fingerprint', ?)")
                    .bind(session.account_id())
                    .bind(&fingerprint)
                    .execute(&self.pool)
                    .await?;
                self.signal();
                info!(account = %session.account_id(), "Bound new document store to account");
                Ok(())
            }
            (Some(account), _) if account != session.account_id() => Err(SinkError::Session(
                format!("store belongs to account {account}, not {}", session.account_id()),
            )),
            (Some(_), Some(stored)) if stored == fingerprint => {
                debug!(account = %session.account_id(), "Verified document store session");
                Ok(())
            }
            _ => Err(SinkError::Session(
                "secret does not match the one this store was created with".to_string(),
            )),
        }
    }

    async fn meta(&self, key: &str) -> Result<Option<String>, SinkError> {
        let row = sqlx::query("SELECT value FROM store_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    fn signal(&self) {
        if let Some(activity) = &self.activity {
            activity();
        }
    }

    /// Get a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is unreadable.
    pub async fn get(&self, id: DocumentId) -> Result<Option<StoredDocument>, SinkError> {
        let row = sqlx::query(
            r"
            SELECT id, object_type, name, source, description, blocks_json,
                   created_at, original_created_at, revision
            FROM documents
            WHERE id = ? AND account_id = ?
            ",
        )
        .bind(id.to_string())
        .bind(&self.account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    /// Number of documents owned by this account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<u64, SinkError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM documents WHERE account_id = ?")
            .bind(&self.account_id)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("count");
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Inserts or replaces one snapshot inside the import transaction.
    async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        snapshot: &DocumentSnapshot,
        update_existing: bool,
    ) -> Result<Upsert, SinkError> {
        if snapshot.details.source.is_empty() {
            return Err(SinkError::Rejected {
                id: snapshot.id,
                reason: "snapshot has no source".to_string(),
            });
        }

        let id = snapshot.id.to_string();
        let exists = sqlx::query("SELECT revision FROM documents WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *conn)
            .await?
            .is_some();

        if exists && !update_existing {
            return Ok(Upsert::Skipped);
        }

        let blocks_json = serde_json::to_string(&snapshot.blocks)?;
        let now = Utc::now().to_rfc3339();

        if exists {
            sqlx::query(
                r"
                UPDATE documents SET
                    object_type = ?,
                    name = ?,
                    source = ?,
                    blocks_json = ?,
                    created_at = ?,
                    original_created_at = ?,
                    imported_at = ?,
                    revision = revision + 1
                WHERE id = ?
                ",
            )
            .bind(snapshot.details.object_type.as_str())
            .bind(&snapshot.details.name)
            .bind(&snapshot.details.source)
            .bind(&blocks_json)
            .bind(snapshot.details.created_at.to_rfc3339())
            .bind(snapshot.original_created_at.to_rfc3339())
            .bind(&now)
            .bind(&id)
            .execute(&mut *conn)
            .await?;
            Ok(Upsert::Updated)
        } else {
            sqlx::query(
                r"
                INSERT INTO documents
                    (id, account_id, object_type, name, source, blocks_json,
                     created_at, original_created_at, imported_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&id)
            .bind(&self.account_id)
            .bind(snapshot.details.object_type.as_str())
            .bind(&snapshot.details.name)
            .bind(&snapshot.details.source)
            .bind(&blocks_json)
            .bind(snapshot.details.created_at.to_rfc3339())
            .bind(snapshot.original_created_at.to_rfc3339())
            .bind(&now)
            .execute(&mut *conn)
            .await?;
            Ok(Upsert::Created)
        }
    }
}

#[async_trait]
impl IngestionSink for DocumentStore {
    async fn import(
        &self,
        batch: Vec<DocumentSnapshot>,
        options: ImportOptions,
    ) -> Result<ImportSummary, SinkError> {
        let total = batch.len();
        let mut summary = ImportSummary::default();
        let mut tx = self.pool.begin().await?;

        for (index, snapshot) in batch.iter().enumerate() {
            match self.upsert(&mut tx, snapshot, options.update_existing).await {
                Ok(Upsert::Created) => summary.created += 1,
                Ok(Upsert::Updated) => summary.updated += 1,
                Ok(Upsert::Skipped) => summary.skipped += 1,
                Err(e) if options.ignore_errors => {
                    warn!(id = %snapshot.id, error = %e, "Ignoring document that failed to import");
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
            if !options.no_progress {
                info!(done = index + 1, total, "Import progress");
            }
        }

        tx.commit().await?;
        self.signal();
        debug!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Imported batch"
        );
        Ok(summary)
    }
}

#[async_trait]
impl SourceLookup for DocumentStore {
    async fn find_by_source(&self, source: &str) -> Result<Option<DocumentId>, SinkError> {
        let row = sqlx::query(
            r"
            SELECT id FROM documents
            WHERE account_id = ? AND source = ?
            ORDER BY created_at ASC
            LIMIT 1
            ",
        )
        .bind(&self.account_id)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| parse_id(&row.get::<String, _>("id")))
            .transpose()
    }

    async fn get_or_create_by_source(&self, source: &str) -> Result<(DocumentId, bool), SinkError> {
        if let Some(id) = self.find_by_source(source).await? {
            return Ok((id, false));
        }

        let id = DocumentId::random();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO documents
                (id, account_id, object_type, name, source, description,
                 created_at, imported_at)
            VALUES (?, ?, ?, '', ?, ?, ?, ?)
            ",
        )
        .bind(id.to_string())
        .bind(&self.account_id)
        .bind(ObjectType::Note.as_str())
        .bind(source)
        .bind(source)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.signal();

        debug!(id = %id, source = %source, "Created note for source");
        Ok((id, true))
    }
}

fn parse_id(raw: &str) -> Result<DocumentId, SinkError> {
    raw.parse()
        .map_err(|e| SinkError::Corrupt(format!("invalid document id {raw}: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SinkError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SinkError::Corrupt(format!("invalid timestamp {raw}: {e}")))
}

fn row_to_document(row: &SqliteRow) -> Result<StoredDocument, SinkError> {
    let blocks: Vec<Block> = serde_json::from_str(&row.get::<String, _>("blocks_json"))?;
    let original_created_at = row
        .get::<Option<String>, _>("original_created_at")
        .as_deref()
        .map(parse_timestamp)
        .transpose()?;

    Ok(StoredDocument {
        id: parse_id(&row.get::<String, _>("id"))?,
        object_type: ObjectType::from_str_lossy(&row.get::<String, _>("object_type")),
        name: row.get("name"),
        source: row.get("source"),
        description: row.get("description"),
        blocks,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        original_created_at,
        revision: row.get("revision"),
    })
}
