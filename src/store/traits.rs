//! Unified `Database` trait — single async interface for profile rows and
//! per-session settings.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::profile::model::Profile;

/// Result of an insert-or-ignore on the profile primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written.
    Inserted,
    /// A row with the same id already existed; nothing was written.
    AlreadyExists,
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Look up a profile by identity-provider user id.
    async fn find_profile_by_id(&self, id: &str) -> Result<Option<Profile>, DatabaseError>;

    /// Look up a profile by username.
    async fn find_profile_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Profile>, DatabaseError>;

    /// Insert a profile, ignoring the write if the id is already taken.
    ///
    /// A clash on `username` is reported as `DatabaseError::Constraint`.
    async fn create_profile(&self, profile: &Profile) -> Result<InsertOutcome, DatabaseError>;

    // ── Settings ────────────────────────────────────────────────────

    /// Read a JSON setting for a session.
    async fn get_setting(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Write (upsert) a JSON setting for a session.
    async fn set_setting(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Delete a setting. Returns whether a row was removed.
    async fn delete_setting(&self, session_id: &str, key: &str) -> Result<bool, DatabaseError>;
}
