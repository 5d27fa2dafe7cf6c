//! Domain-level error types for cortana-backup.
//!
//! All errors are typed with `thiserror`. A backup run never swallows one:
//! the first error aborts the channel being processed and the rest of the run.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network or HTTP failure while paging history or downloading a file.
    #[error("Fetch error: {message}")]
    Fetch {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Remote payload did not have the shape we expected.
    #[error("Unexpected content: {message}")]
    ContentShape { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error (unknown channel, bad date, missing token).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a fetch error from a reqwest error.
    pub fn fetch(err: reqwest::Error) -> Self {
        Self::Fetch {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a fetch error for a non-success HTTP status.
    pub fn fetch_status(url: &str, status: reqwest::StatusCode) -> Self {
        Self::Fetch {
            message: format!("GET {url} returned {status}"),
            source: None,
        }
    }

    /// Create a content-shape error.
    pub fn content_shape(message: impl Into<String>) -> Self {
        Self::ContentShape {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
