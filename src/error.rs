// src/error.rs

//! Unified error handling for the trends monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration is missing or invalid. Always fatal, raised before any network call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No group owns the requested time slot or id
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// Export sink rejected a record
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Backup sink failed
    #[error("Backup error for {context}: {message}")]
    Backup { context: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a schedule error.
    pub fn schedule(message: impl Into<String>) -> Self {
        Self::Schedule(message.into())
    }

    /// Create a backup error with context.
    pub fn backup(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Backup {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error must stop the process before any work starts.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Schedule(_) | Self::Toml(_)
        )
    }
}

/// Failure reported by an export sink for a single record.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The sink could not persist the row
    #[error("write to {target} failed: {message}")]
    Write { target: String, message: String },

    /// The record cannot be represented in the sink
    #[error("rejected record: {0}")]
    Rejected(String),
}

impl ExportError {
    /// Create a write error for a named target.
    pub fn write(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Write {
            target: target.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal_setup() {
        assert!(AppError::config("missing terms").is_fatal_setup());
        assert!(AppError::schedule("no window").is_fatal_setup());
        assert!(!AppError::backup("run", "disk full").is_fatal_setup());
    }

    #[test]
    fn test_export_error_display_names_target() {
        let err = ExportError::write("Related_Queries_Top", "disk full");
        assert_eq!(
            err.to_string(),
            "write to Related_Queries_Top failed: disk full"
        );
    }
}
