// src/error.rs

//! Unified error handling for the seat crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Every retry for a URL failed at the connection level
    #[error("Fetch failed for {url} after {attempts} attempts")]
    Fetch { url: String, attempts: u32 },

    /// Caller-supplied scope string or URL could not be read as an identifier
    #[error("Invalid identifier '{input}': {reason}")]
    InvalidIdentifier { input: String, reason: String },

    /// Page was fetched but held neither child links nor the not-offered notice
    #[error("Unexpected page at {url}: {reason}")]
    UnexpectedPage { url: String, reason: String },

    /// Single connection-level failure (retryable)
    #[error("Connection error for {url}: {message}")]
    Connection { url: String, message: String },

    /// Run stopped on the first job failure
    #[error("Run aborted at {url}: {source}")]
    Aborted {
        url: String,
        #[source]
        source: Box<AppError>,
    },

    /// A worker task panicked or was cancelled
    #[error("Worker failed: {0}")]
    Worker(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
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

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an invalid identifier error.
    pub fn invalid_identifier(input: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidIdentifier {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an unexpected page error.
    pub fn unexpected_page(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::UnexpectedPage {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a connection error.
    pub fn connection(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a worker failure error.
    pub fn worker(message: impl fmt::Display) -> Self {
        Self::Worker(message.to_string())
    }

    /// Whether the fetcher may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_errors_are_retryable() {
        assert!(AppError::connection("https://example.com", "refused").is_retryable());
        assert!(!AppError::unexpected_page("https://example.com", "empty").is_retryable());
        assert!(
            !AppError::Fetch {
                url: "https://example.com".into(),
                attempts: 10
            }
            .is_retryable()
        );
    }

    #[test]
    fn fetch_error_reports_attempts() {
        let err = AppError::Fetch {
            url: "https://example.com/x".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Fetch failed for https://example.com/x after 3 attempts"
        );
    }
}
