//! SDK Error Types
//!
//! Defines error types for the Strata SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SdkResult<T> = Result<T, SdkError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Hook identifier not known to the dispatcher
    #[error("unknown hook: {name}")]
    UnknownHook { name: String },

    /// Extension runtime error (context creation, marshaling, evaluation)
    #[error("runtime error: {0}")]
    Runtime(#[from] crate::extensions::RuntimeError),

    /// Script pack error
    #[error("script pack {pack}: {message}")]
    Pack { pack: String, message: String },

    /// Dimension error
    #[error("dimension error: {0}")]
    Dimension(#[from] strata_core::DimensionError),

    /// Invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Timeout error
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest parse error
    #[error("manifest error: {0}")]
    Manifest(#[from] toml::de::Error),
}

impl SdkError {
    /// Create an unknown hook error
    pub fn unknown_hook(name: impl Into<String>) -> Self {
        Self::UnknownHook { name: name.into() }
    }

    /// Create a script pack error
    pub fn pack(pack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pack {
            pack: pack.into(),
            message: message.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Check if this error is an unknown hook error
    pub fn is_unknown_hook(&self) -> bool {
        matches!(self, Self::UnknownHook { .. })
    }

    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
