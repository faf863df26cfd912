//! Error handling for the poll platform

/// Result type alias for the poll platform
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the poll platform
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A session, participant, or item does not exist (404-equivalent)
    #[error("{what} not found")]
    NotFound { what: String },

    /// Missing or malformed input (400-equivalent, field-level)
    #[error("Validation failed: {field}")]
    Validation { field: String },

    /// A participant link failed to decode, decrypt, or authenticate,
    /// expired, or references a session that no longer exists. The cause
    /// is deliberately never distinguished.
    #[error("Invalid or expired voting link")]
    InvalidLink,

    /// Illegal session lifecycle transition
    #[error("Invalid session state: {message}")]
    State { message: String },

    /// I/O failure during persistence
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure in an external collaborator (email delivery). Callers
    /// report this as a warning rather than aborting the operation.
    #[error("External service error: {message}")]
    ExternalService { message: String },
}

impl Error {
    /// Create a new not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }

    /// Create a new lifecycle-state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a new external-service error
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
        }
    }
}

/// Convenience macro for lifecycle-state errors
#[macro_export]
macro_rules! state_error {
    ($msg:expr) => {
        $crate::Error::state($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::state(format!($fmt, $($arg)*))
    };
}
