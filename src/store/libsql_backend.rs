//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::profile::model::Profile;
use crate::store::migrations;
use crate::store::traits::{Database, InsertOutcome};

/// libSQL database backend.
///
/// One connection is opened per backend and shared by every call.
pub struct LibSqlBackend {
    // Owns the handle the connection was opened from.
    _db: LibSqlDatabase,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let backend = Self::open(path).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database. Nothing survives the backend.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        Self::open(Path::new(":memory:")).await
    }

    async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self { _db: db, conn };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql error on write, separating uniqueness violations from
/// everything else.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {message}"))
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

/// Map a libsql Row to a Profile.
///
/// Column order matches PROFILE_COLUMNS: 0:id, 1:username, 2:name, 3:created_at
fn row_to_profile(row: &libsql::Row) -> Result<Profile, libsql::Error> {
    let created_str: String = row.get(3)?;
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get::<String>(2).ok(),
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "id, username, name, created_at";

impl LibSqlBackend {
    async fn query_one_profile(
        &self,
        op: &str,
        sql: &str,
        key: &str,
    ) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let profile = row_to_profile(&row)
                    .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?;
                Ok(Some(profile))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn find_profile_by_id(&self, id: &str) -> Result<Option<Profile>, DatabaseError> {
        self.query_one_profile(
            "find_profile_by_id",
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            id,
        )
        .await
    }

    async fn find_profile_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Profile>, DatabaseError> {
        self.query_one_profile(
            "find_profile_by_username",
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = ?1"),
            username,
        )
        .await
    }

    async fn create_profile(&self, profile: &Profile) -> Result<InsertOutcome, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "INSERT INTO profiles (id, username, name, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id) DO NOTHING",
                params![
                    profile.id.as_str(),
                    profile.username.as_str(),
                    opt_text(profile.name.as_deref()),
                    profile.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("create_profile", e))?;

        if changed == 0 {
            debug!(user_id = %profile.id, "Profile already exists, insert ignored");
            return Ok(InsertOutcome::AlreadyExists);
        }

        debug!(user_id = %profile.id, username = %profile.username, "Profile inserted into DB");
        Ok(InsertOutcome::Inserted)
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT value FROM settings WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?
        else {
            return Ok(None);
        };

        let raw: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("get_setting row parse: {e}")))?;
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            DatabaseError::Serialization(format!("setting {session_id}/{key} holds {raw:?}: {e}"))
        })
    }

    async fn set_setting(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO settings (session_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (session_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
            params![session_id, key, value_str, now],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    async fn delete_setting(&self, session_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "DELETE FROM settings WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
