//! Error types for klustercost-ask.
//!
//! Defines the main error enum used throughout the question pipeline.

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    /// Database connection errors (host unreachable, auth failed, pool exhausted, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The schema catalog could not be read from the store.
    #[error("Schema catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// The model answered with no usable text.
    #[error("The language model returned an empty response, no SQL was generated")]
    EmptyGeneration,

    /// The store rejected or failed the generated SQL, or the validator refused it.
    #[error("Query error: {0}")]
    Execution(String),

    /// The executed statement produced no tabular result.
    #[error("Query returned no result set, only SELECT statements are supported")]
    NoResultSet,

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::CatalogUnavailable(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::CatalogUnavailable(_) => "Catalog Unavailable",
            Self::Llm(_) => "LLM Error",
            Self::EmptyGeneration => "Empty Generation",
            Self::Execution(_) => "Execution Failure",
            Self::NoResultSet => "No Result Set",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using AskError.
pub type Result<T> = std::result::Result<T, AskError>;
