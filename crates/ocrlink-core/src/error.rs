//! Error types for OcrLink

use thiserror::Error;

/// Main error type for OcrLink operations
///
/// None of these are fatal to the process: every variant describes a failure
/// local to one request or one connection.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("No receiver connected for device {0}")]
    UnknownDevice(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Transport failure for device {0}")]
    TransportFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using OcrLink's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error means a routed event was simply not delivered
    pub fn is_undelivered(&self) -> bool {
        matches!(self, Error::UnknownDevice(_) | Error::TransportFailure(_))
    }
}
