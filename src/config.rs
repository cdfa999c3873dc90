//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Base suffix space used for generated usernames.
pub const BASE_SUFFIX_SPACE: u32 = 10_000;

/// Fallback suffix space once the base space keeps colliding.
pub const WIDE_SUFFIX_SPACE: u32 = 1_000_000_000;

/// Username generation limits for the profile provisioner.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Candidates tried per suffix space before moving on.
    pub max_attempts: u32,
    /// Suffixes are drawn from `[0, base_suffix_space)` first.
    pub base_suffix_space: u32,
    /// Then from `[0, wide_suffix_space)`.
    pub wide_suffix_space: u32,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_suffix_space: BASE_SUFFIX_SPACE,
            wide_suffix_space: WIDE_SUFFIX_SPACE,
        }
    }
}

/// Connection details for the hosted identity service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Public (anon) API key sent with every request.
    pub api_key: SecretString,
}

impl AuthConfig {
    /// Build from `LIFT_ROOMS_AUTH_URL` / `LIFT_ROOMS_AUTH_KEY`.
    /// Returns `Ok(None)` when no URL is configured.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(base_url) = std::env::var("LIFT_ROOMS_AUTH_URL") else {
            return Ok(None);
        };
        let api_key = std::env::var("LIFT_ROOMS_AUTH_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("LIFT_ROOMS_AUTH_KEY".into()))?;
        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
        }))
    }
}

/// Application configuration for the terminal driver.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Key the current scene is persisted under.
    pub session_key: String,
    pub auth: Option<AuthConfig>,
    pub provisioner: ProvisionerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("LIFT_ROOMS_DB_PATH")
            .unwrap_or_else(|_| "./data/lift-rooms.db".to_string())
            .into();

        let session_key =
            std::env::var("LIFT_ROOMS_SESSION").unwrap_or_else(|_| "default".to_string());

        let max_attempts = match std::env::var("LIFT_ROOMS_USERNAME_ATTEMPTS") {
            Ok(raw) => parse_attempts(&raw)?,
            Err(_) => ProvisionerConfig::default().max_attempts,
        };

        Ok(Self {
            db_path,
            session_key,
            auth: AuthConfig::from_env()?,
            provisioner: ProvisionerConfig {
                max_attempts,
                ..Default::default()
            },
        })
    }
}

fn parse_attempts(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: "LIFT_ROOMS_USERNAME_ATTEMPTS".into(),
            message: format!("expected a positive integer, got {raw:?}"),
        }),
    }
}
