//! Error types for strata-core.

use thiserror::Error;

/// Result type alias using strata-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the host-facing contract
#[derive(Error, Debug)]
pub enum Error {
    // Dimension errors
    #[error("Invalid dimension config: {0}")]
    Dimension(#[from] crate::dimension::DimensionError),

    #[error("Dimension already registered: {0}")]
    DimensionExists(String),
}

/// Render a caught panic payload as text.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
