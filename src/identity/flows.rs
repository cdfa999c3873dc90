//! Sign-in, sign-up, OAuth completion and password flows layered over an
//! `IdentityProvider`, with profile provisioning on login.

use std::sync::Arc;

use crate::error::{Error, IdentityError};
use crate::profile::{Profile, ProfileProvisioner};

use super::provider::{IdentityProvider, User};

/// Minimum accepted length for a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Result of a successful password sign-in.
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user: User,
    pub first_login: bool,
    /// `None` when provisioning failed; sign-in itself still succeeded.
    pub profile: Option<Profile>,
}

/// Result of a sign-up request.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: Option<User>,
    pub message: String,
}

pub struct AuthFlows {
    identity: Arc<dyn IdentityProvider>,
    provisioner: Arc<ProfileProvisioner>,
}

impl AuthFlows {
    pub fn new(identity: Arc<dyn IdentityProvider>, provisioner: Arc<ProfileProvisioner>) -> Self {
        Self {
            identity,
            provisioner,
        }
    }

    /// Password sign-in. Unverified emails are refused.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, Error> {
        let user = self.identity.sign_in_with_password(email, password).await?;

        if !user.is_email_verified() {
            tracing::info!(user_id = %user.id, "Sign-in refused, email not verified");
            return Err(IdentityError::EmailNotVerified.into());
        }

        let first_login = user.is_first_login();
        let account_email = user.email.as_deref().unwrap_or(email);
        let profile = match self
            .provisioner
            .create_profile(&user.id, account_email, user.full_name())
            .await
        {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Profile provisioning after sign-in failed");
                None
            }
        };

        tracing::info!(user_id = %user.id, first_login, "Signed in");
        Ok(SignInOutcome {
            user,
            first_login,
            profile,
        })
    }

    /// Register an account; `username` lands in the provider's user metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome, Error> {
        let metadata = match username.filter(|u| !u.trim().is_empty()) {
            Some(u) => serde_json::json!({ "username": u.trim() }),
            None => serde_json::json!({}),
        };
        let user = self.identity.sign_up(email, password, metadata).await?;
        Ok(SignUpOutcome {
            user,
            message: "Signup successful! Please check your email to verify your account.".into(),
        })
    }

    /// After an OAuth redirect: provision the profile of the session user.
    /// Returns `None` when no session came back.
    pub async fn complete_oauth(&self) -> Result<Option<Profile>, Error> {
        let Some(user) = self.identity.current_user().await? else {
            tracing::info!("OAuth callback without a session");
            return Ok(None);
        };
        let profile = self
            .provisioner
            .create_or_get_profile(&user.id, user.email.as_deref(), user.full_name())
            .await?;
        Ok(Some(profile))
    }

    pub async fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String, Error> {
        Ok(self.identity.oauth_authorize_url(provider, redirect_to).await?)
    }

    pub async fn update_password(&self, new_password: &str) -> Result<(), Error> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            }
            .into());
        }
        self.identity.update_password(new_password).await?;
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), Error> {
        Ok(self.identity.reset_password(email).await?)
    }

    pub async fn sign_out(&self) -> Result<(), Error> {
        Ok(self.identity.sign_out().await?)
    }

    /// Label for the signed-in user, or `None` when signed out or the
    /// session lookup fails.
    pub async fn session_label(&self) -> Option<String> {
        match self.identity.current_user().await {
            Ok(Some(user)) => user.display_label().map(String::from),
            _ => None,
        }
    }
}
