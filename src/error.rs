//! Error types for lift-rooms.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Navigator error: {0}")]
    Navigator(#[from] NavigatorError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// A uniqueness or other constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Identity collaborator errors.
///
/// Provider-specific error shapes are flattened to a human-readable message.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Please verify your email before logging in.")]
    EmailNotVerified,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Invalid response from identity service: {0}")]
    InvalidResponse(String),
}

/// Profile provisioning errors.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No free username for {user_id} after {attempts} attempts")]
    UsernameExhausted { user_id: String, attempts: u32 },

    #[error("Profile store unavailable: {0}")]
    BackendUnavailable(#[from] DatabaseError),
}

/// Scene navigator errors. The navigator never changes scene when one of
/// these is returned.
#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    #[error("Identity check failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Failed to persist scene: {0}")]
    Persistence(#[from] DatabaseError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
