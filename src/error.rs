// src/error.rs

//! Unified error handling for the tour watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for tour watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
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

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A date string matched none of the supported formats
    #[error("Unparseable date '{input}'")]
    DateParse { input: String },

    /// A raw record lacks a required field
    #[error("Record is missing required field '{field}'")]
    PartialRecord { field: &'static str },

    /// A source could not deliver any records
    #[error("Source '{source_name}' unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    /// Cached state could not be read back
    #[error("Cache corrupt: {0}")]
    CacheCorrupt(String),

    /// Every attempt to obtain current data failed
    #[error("Unable to refresh after {attempts} attempt(s): {message}")]
    RefreshFailed { attempts: u32, message: String },

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notify(String),

    /// Event count collapsed compared to the previous snapshot
    #[error(
        "Circuit breaker triggered: {previous_count} -> {current_count} events \
         ({drop_percent:.1}% drop > {threshold_percent}%)"
    )]
    CircuitBreakerTriggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// Normalization produced no events while a previous snapshot had some
    #[error("Refresh produced no events")]
    EmptyResult,
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
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

    /// Create a date parsing error carrying the original input.
    pub fn date_parse(input: impl Into<String>) -> Self {
        Self::DateParse {
            input: input.into(),
        }
    }

    /// Create a source error with context.
    pub fn source_unavailable(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }
}
