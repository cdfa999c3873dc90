//! Profile data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application-level record linked one-to-one with an identity-provider user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity-provider user id (primary key, externally owned).
    pub id: String,
    /// Globally unique handle.
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: impl Into<String>, username: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            name,
            created_at: Utc::now(),
        }
    }
}

/// Whether a provisioning path insists on an email being supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailPolicy {
    /// Email/password signup: the caller always has an email.
    Required,
    /// OAuth: the provider may or may not hand one back.
    Optional,
}

/// Input to a provisioning call.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub policy: EmailPolicy,
}

impl ProvisionRequest {
    /// Signup path. Email is part of the signature, so it cannot be left out.
    pub fn signup(user_id: &str, email: &str, name: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: Some(email.to_string()),
            name: name.map(String::from),
            policy: EmailPolicy::Required,
        }
    }

    /// OAuth path.
    pub fn oauth(user_id: &str, email: Option<&str>, name: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.map(String::from),
            name: name.map(String::from),
            policy: EmailPolicy::Optional,
        }
    }
}
