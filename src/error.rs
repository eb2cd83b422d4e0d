//! Error types for the gdrive2sheet crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while syncing shared files into a sheet.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Client secret file not found: {0:?}. It is required for the first login")]
    MissingClientSecret(PathBuf),

    #[error("Failed to read or write a local file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Required field '{field}' missing from file item (id: {id})")]
    MissingField { field: &'static str, id: String },

    #[error("Cannot parse timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Spreadsheet was not found with name '{0}'")]
    SpreadsheetNotFound(String),

    #[error("Worksheet was not found with name '{0}'")]
    WorksheetNotFound(String),
}

/// Result type alias for SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;
