// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error {0}: {1}")]
    Http(reqwest::StatusCode, String), // Status plus response body for diagnostics

    #[error("Request was not authorized - check the ID token")]
    Unauthorized,

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ReconcileError {
    #[error("Unknown period label: {0}")]
    UnknownPeriod(String),

    #[error("Invalid period range: {start} comes after {end}")]
    InvalidRange { start: String, end: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("API interaction failed: {0}")]
    Api(#[from] ApiError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("AI processing failed: {0}")]
    Ai(String),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
