//! Error handling for derivtree-rs
//!
//! This module defines the crate error type and a Result alias used by every
//! operation. Cancellation is deliberately absent here: a cancelled traversal
//! or batch is reported through [`crate::traversal::Outcome`], not as an error.

use thiserror::Error;

/// Main error type for derivtree-rs operations
#[derive(Error, Debug)]
pub enum DeriveError {
    /// A transform failed while being applied to a record
    #[error("Transform '{function}' failed: {message}")]
    Transform { function: String, message: String },

    /// A record lacks a field the core relies on (usually `display`)
    #[error("Record is missing required field '{0}'")]
    MissingField(String),

    /// A record field holds a value of the wrong kind
    #[error("Field '{field}' has unexpected type, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
    },

    /// Errors related to Rhai script compilation or execution
    #[error("Script error: {0}")]
    Script(String),

    /// Invalid search pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// A walker was misused, e.g. run twice
    #[error("Traversal error: {0}")]
    Traversal(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the batch worker pool
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DeriveError>,
    },
}

impl DeriveError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DeriveError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        DeriveError::Script(err.to_string())
    }

    /// Wrap a failure reported by the named transform
    pub fn transform(function: impl Into<String>, message: impl Into<String>) -> Self {
        DeriveError::Transform {
            function: function.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DeriveError {
    fn from(err: serde_json::Error) -> Self {
        DeriveError::Serialization(err.to_string())
    }
}

/// Result type alias for derivtree-rs operations
pub type Result<T> = std::result::Result<T, DeriveError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DeriveError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DeriveError::from_rhai_error(e).with_context(f()))
    }
}
