//! ProfileProvisioner — guarantees exactly one profile per identity with a
//! unique, human-readable username.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ProvisionerConfig;
use crate::error::{DatabaseError, ProvisionError};
use crate::store::{Database, InsertOutcome};

use super::model::{EmailPolicy, Profile, ProvisionRequest};
use super::username::{RandomSuffix, SuffixSource, candidate, username_stem};

/// Creates profiles on first login and hands back existing ones afterwards.
pub struct ProfileProvisioner {
    db: Arc<dyn Database>,
    suffixes: Arc<dyn SuffixSource>,
    config: ProvisionerConfig,
}

impl ProfileProvisioner {
    pub fn new(db: Arc<dyn Database>, config: ProvisionerConfig) -> Self {
        Self::with_suffix_source(db, config, Arc::new(RandomSuffix))
    }

    pub fn with_suffix_source(
        db: Arc<dyn Database>,
        config: ProvisionerConfig,
        suffixes: Arc<dyn SuffixSource>,
    ) -> Self {
        Self {
            db,
            suffixes,
            config,
        }
    }

    /// Email/password signup path.
    pub async fn create_profile(
        &self,
        user_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<Profile, ProvisionError> {
        self.provision(ProvisionRequest::signup(user_id, email, name))
            .await
    }

    /// OAuth path. Fails with `InvalidInput` when the provider gave no email.
    pub async fn create_or_get_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Profile, ProvisionError> {
        self.provision(ProvisionRequest::oauth(user_id, email, name))
            .await
    }

    /// Return the profile for `request.user_id`, creating it if absent.
    ///
    /// An existing profile is returned unchanged; name and username are
    /// never overwritten.
    pub async fn provision(&self, request: ProvisionRequest) -> Result<Profile, ProvisionError> {
        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| match request.policy {
                EmailPolicy::Required => {
                    ProvisionError::InvalidInput("Email must not be blank".into())
                }
                EmailPolicy::Optional => ProvisionError::InvalidInput("Email is required".into()),
            })?;

        if request.user_id.trim().is_empty() {
            return Err(ProvisionError::InvalidInput("User id must not be blank".into()));
        }

        if let Some(existing) = self.db.find_profile_by_id(&request.user_id).await? {
            debug!(user_id = %request.user_id, "Profile already provisioned");
            return Ok(existing);
        }

        let stem = username_stem(email);
        let spaces = [self.config.base_suffix_space, self.config.wide_suffix_space];
        let mut attempt = 0u32;

        for space in spaces {
            for _ in 0..self.config.max_attempts {
                attempt += 1;
                let username = candidate(&stem, self.suffixes.as_ref(), space);

                if self.db.find_profile_by_username(&username).await?.is_some() {
                    debug!(%username, attempt, "Username taken, regenerating");
                    continue;
                }

                let profile = Profile::new(&request.user_id, username, request.name.clone());
                match self.db.create_profile(&profile).await {
                    Ok(InsertOutcome::Inserted) => {
                        info!(
                            user_id = %profile.id,
                            username = %profile.username,
                            attempt,
                            "Profile created"
                        );
                        return Ok(profile);
                    }
                    Ok(InsertOutcome::AlreadyExists) => {
                        // Another caller won the race on this id.
                        return self.refetch(&request.user_id).await;
                    }
                    Err(DatabaseError::Constraint(reason)) => {
                        debug!(username = %profile.username, attempt, %reason, "Username claimed concurrently");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if space == self.config.base_suffix_space {
                debug!(user_id = %request.user_id, "Widening username suffix space");
            }
        }

        warn!(user_id = %request.user_id, attempts = attempt, "Username generation exhausted");
        Err(ProvisionError::UsernameExhausted {
            user_id: request.user_id,
            attempts: attempt,
        })
    }

    async fn refetch(&self, user_id: &str) -> Result<Profile, ProvisionError> {
        match self.db.find_profile_by_id(user_id).await? {
            Some(profile) => Ok(profile),
            None => Err(ProvisionError::BackendUnavailable(DatabaseError::Query(
                format!("profile {user_id} reported as existing but could not be read"),
            ))),
        }
    }
}
