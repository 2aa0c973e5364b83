//! libSQL-backed session store.
//!
//! A [`SessionStore`] keeps the latest JSON snapshot per session id and
//! retains at most `max_sessions` of them. When a new session pushes the
//! count past the limit, the sessions inserted earliest are evicted (FIFO
//! by first insertion, not by last access). Re-saving an existing session
//! replaces its snapshot and keeps its place in line.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use learnkit_shared::{LearnkitError, Result, SessionId};

/// A stored session snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload_json: String,
}

impl SessionRecord {
    /// Deserialize the stored snapshot.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.payload_json)?)
    }
}

/// Listing entry without the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session persistence handle wrapping a libSQL database.
pub struct SessionStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    max_sessions: usize,
}

fn storage_err(e: impl std::fmt::Display) -> LearnkitError {
    LearnkitError::Storage(e.to_string())
}

impl SessionStore {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path, max_sessions: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LearnkitError::io(parent, e))?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        Self::from_database(db, max_sessions).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory(max_sessions: usize) -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(storage_err)?;
        Self::from_database(db, max_sessions).await
    }

    async fn from_database(db: Database, max_sessions: usize) -> Result<Self> {
        if max_sessions == 0 {
            return Err(LearnkitError::config("max_sessions must be at least 1"));
        }
        let conn = db.connect().map_err(storage_err)?;
        let store = Self {
            db,
            conn,
            max_sessions,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LearnkitError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Insert or replace the snapshot for `id`, then evict past the limit.
    ///
    /// Returns the ids evicted by this save, oldest first.
    pub async fn save<T: Serialize>(
        &self,
        id: &SessionId,
        label: Option<&str>,
        value: &T,
    ) -> Result<Vec<SessionId>> {
        let payload = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();

        // Upsert and eviction commit together; dropping `tx` rolls back.
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "INSERT INTO sessions (id, label, created_at, updated_at, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
               label = excluded.label,
               updated_at = excluded.updated_at,
               payload_json = excluded.payload_json",
            params![id.as_str(), label, now.as_str(), now.as_str(), payload],
        )
        .await
        .map_err(storage_err)?;

        let evicted = evict_overflow(&tx, self.max_sessions).await?;
        tx.commit().await.map_err(storage_err)?;

        debug!(session = %id, "session saved");
        for id in &evicted {
            info!(session = %id, "evicted oldest session");
        }
        Ok(evicted)
    }

    pub async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, label, created_at, updated_at, payload_json
                 FROM sessions WHERE id = ?1",
                params![id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(SessionRecord {
                id: SessionId(row.get::<String>(0).map_err(storage_err)?),
                label: row.get::<String>(1).ok(),
                created_at: parse_timestamp(&row.get::<String>(2).map_err(storage_err)?)?,
                updated_at: parse_timestamp(&row.get::<String>(3).map_err(storage_err)?)?,
                payload_json: row.get::<String>(4).map_err(storage_err)?,
            })),
            None => Ok(None),
        }
    }

    /// Load and deserialize the snapshot for `id`.
    pub async fn load<T: DeserializeOwned>(&self, id: &SessionId) -> Result<Option<T>> {
        self.get(id)
            .await?
            .map(|record| record.payload())
            .transpose()
    }

    /// All sessions in insertion order, oldest first.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, label, created_at, updated_at FROM sessions ORDER BY seq",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(SessionSummary {
                id: SessionId(row.get::<String>(0).map_err(storage_err)?),
                label: row.get::<String>(1).ok(),
                created_at: parse_timestamp(&row.get::<String>(2).map_err(storage_err)?)?,
                updated_at: parse_timestamp(&row.get::<String>(3).map_err(storage_err)?)?,
            });
        }
        Ok(results)
    }

    /// Remove a session. Returns whether it existed.
    pub async fn delete(&self, id: &SessionId) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sessions", params![])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as usize),
            None => Ok(0),
        }
    }
}

/// Delete everything past the newest `max_sessions`, returning the
/// removed ids oldest first.
async fn evict_overflow(conn: &Connection, max_sessions: usize) -> Result<Vec<SessionId>> {
    let mut rows = conn
        .query(
            "SELECT id FROM sessions ORDER BY seq DESC LIMIT -1 OFFSET ?1",
            params![max_sessions as i64],
        )
        .await
        .map_err(storage_err)?;

    let mut evicted = Vec::new();
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        evicted.push(SessionId(row.get::<String>(0).map_err(storage_err)?));
    }
    evicted.reverse();

    for id in &evicted {
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;
    }
    Ok(evicted)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| LearnkitError::Storage(format!("bad timestamp '{raw}': {e}")))
}
