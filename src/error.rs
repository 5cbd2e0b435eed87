use std::error::Error;
use std::fmt;
use std::sync::PoisonError;
use std::time::Duration;

use warp::http::StatusCode;

#[derive(Debug)]
pub enum WardenError {
    // Integrity errors
    UnknownAuthenticator(String),
    TokenNotFound(String),
    ConstraintBackingMissing { table: String, kind: String },

    // Identity backend errors
    UserNotFound(String),
    UserAlreadyExists(String),
    PasswordHashError(String),

    // Storage errors
    TableNotFound(String),
    StorageError(String),
    StoreTimeout { operation: &'static str, timeout: Duration },
    SerializationError(String),

    // Registry errors
    RegistryLock(String),

    // Validation errors
    ValidationError(String),

    // Configuration errors
    ConfigError(String),
}

impl WardenError {
    /// HTTP status the interception layer answers with for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownAuthenticator(_) | Self::TokenNotFound(_) | Self::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::UserAlreadyExists(_) => StatusCode::CONFLICT,
            Self::ConstraintBackingMissing { .. }
            | Self::PasswordHashError(_)
            | Self::TableNotFound(_)
            | Self::StorageError(_)
            | Self::StoreTimeout { .. }
            | Self::SerializationError(_)
            | Self::RegistryLock(_)
            | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for WardenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAuthenticator(name) => write!(f, "Unknown authenticator: {}", name),
            Self::TokenNotFound(_) => write!(f, "The token does not exist"),
            Self::ConstraintBackingMissing { table, kind } => {
                write!(f, "Constraint backing {}/{} is not found", table, kind)
            }
            Self::UserNotFound(name) => write!(f, "User not found: {}", name),
            Self::UserAlreadyExists(name) => write!(f, "User already exists: {}", name),
            Self::PasswordHashError(msg) => write!(f, "Password hash error: {}", msg),
            Self::TableNotFound(table) => write!(f, "Table not found: {}", table),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::StoreTimeout { operation, timeout } => write!(
                f,
                "Store {} did not complete within {}ms",
                operation,
                timeout.as_millis()
            ),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::RegistryLock(msg) => write!(f, "Authenticator registry lock error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for WardenError {}

// Converting from PoisonError to facilitate poisoned lock handling
impl<T> From<PoisonError<T>> for WardenError {
    fn from(err: PoisonError<T>) -> Self {
        WardenError::RegistryLock(format!("Lock poisoned: {}", err))
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        WardenError::SerializationError(err.to_string())
    }
}

// Generic result type for the warden
pub type Result<T> = std::result::Result<T, WardenError>;
