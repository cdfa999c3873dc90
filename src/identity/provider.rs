//! `IdentityProvider` trait — the hosted authentication service as seen by
//! the navigator and the auth flows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// An authenticated identity-provider user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl User {
    pub fn new(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: id.into(),
            email: email.map(String::from),
            ..Default::default()
        }
    }

    /// A user only counts as signed in once the provider has an email for them.
    pub fn is_signed_in(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }

    /// First sign-in: the account was created in the same moment it last signed in.
    pub fn is_first_login(&self) -> bool {
        matches!(
            (self.created_at, self.last_sign_in_at),
            (Some(created), Some(last)) if created == last
        )
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Display name from provider metadata (`full_name`), if any.
    pub fn full_name(&self) -> Option<&str> {
        self.metadata_str("full_name")
    }

    /// Label for the navigation bar: chosen username, else email.
    pub fn display_label(&self) -> Option<&str> {
        self.metadata_str("username").or(self.email.as_deref())
    }
}

/// Operations consumed from the hosted identity service.
///
/// Every call is an opaque network call that can fail; only a human-readable
/// message is kept from failures.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user of the current session, if any.
    async fn current_user(&self) -> Result<Option<User>, IdentityError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<User, IdentityError>;

    /// Register a new account. `metadata` is stored as user metadata.
    /// Returns the user when the provider hands one back before confirmation.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<User>, IdentityError>;

    /// URL to send the visitor to for an OAuth sign-in.
    async fn oauth_authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Send a password-reset email.
    async fn reset_password(&self, email: &str) -> Result<(), IdentityError>;

    /// Change the password of the signed-in user.
    async fn update_password(&self, new_password: &str) -> Result<(), IdentityError>;
}
