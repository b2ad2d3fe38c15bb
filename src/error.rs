//! Error types for InvestorOS onboarding.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Profile store errors (remote or local).
///
/// "Record does not exist" is not an error; see `LoadOutcome::NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Store responded with status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Store rejected credentials")]
    Unauthorized,

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Pool(_) => true,
            Self::Status { code, .. } => matches!(*code, 408 | 429 | 500..=599),
            Self::Unauthorized
            | Self::Query(_)
            | Self::Migration(_)
            | Self::Serialization(_) => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A profile value outside its closed domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("maxTrades must be within 1..=10, got {value}")]
    MaxTradesOutOfRange { value: i64 },

    #[error("Unknown value for {field}: {value:?}")]
    UnknownValue { field: &'static str, value: String },

    #[error("accountSize must be positive")]
    NonPositiveAccountSize,

    #[error("Unsupported leverage {value}x (expected 1, 2 or 5)")]
    UnsupportedLeverage { value: u8 },

    #[error("Invalid ticker symbol: {0:?}")]
    InvalidTicker(String),
}

/// Failure to commit the draft.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("No identity is signed in")]
    NoIdentity,

    #[error("Cannot commit from step {step_index}; every step must be visited first")]
    NotAtFinalStep { step_index: usize },

    #[error("Profile save failed: {0}")]
    Store(#[from] StoreError),

    #[error("Profile save was interrupted: {0}")]
    Interrupted(String),
}

/// Errors from wizard operations that mutate the draft.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Wizard is not editable while {phase}")]
    NotEditable { phase: String },

    #[error("{0}")]
    Persist(#[from] PersistError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
