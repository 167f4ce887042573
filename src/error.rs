// src/error.rs

//! Unified error handling for the crawler and the query service.

use std::fmt;

use thiserror::Error;

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding/decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or data
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested data does not exist
    #[error("{0}")]
    NotFound(String),

    /// Upstream API answered with a non-success status
    #[error("Upstream returned status {status} for {url}")]
    Upstream { status: u16, url: String },

    /// Bounded retry budget exhausted
    #[error("Failed to get data from {url} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// Checkpoint could not be used
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a checkpoint error.
    pub fn checkpoint(message: impl fmt::Display) -> Self {
        Self::Checkpoint(message.to_string())
    }

    /// Create a retry exhaustion error.
    pub fn retries_exhausted(url: impl Into<String>, attempts: u32, reason: impl fmt::Display) -> Self {
        Self::RetriesExhausted {
            url: url.into(),
            attempts,
            reason: reason.to_string(),
        }
    }

    /// Whether the error comes from reading or decoding stored data.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Csv(_) | Self::Json(_))
    }
}
