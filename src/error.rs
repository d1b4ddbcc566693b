//! Error handling for DataForge-RS
//!
//! This module defines the crate-level error type and a Result alias used by
//! project loading and the command-line runner. Graph and operator failures
//! are [`PipelineError`]s and convert into [`DataForgeError::Pipeline`].

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for DataForge-RS operations
#[derive(Error, Debug)]
pub enum DataForgeError {
    /// Structural, operator or cancellation errors from a pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

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
        source: Box<DataForgeError>,
    },
}

impl DataForgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DataForgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The pipeline error underneath any context layers.
    pub fn as_pipeline(&self) -> Option<&PipelineError> {
        match self {
            DataForgeError::Pipeline(e) => Some(e),
            DataForgeError::WithContext { source, .. } => source.as_pipeline(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DataForgeError {
    fn from(err: serde_json::Error) -> Self {
        DataForgeError::Serialization(err.to_string())
    }
}

/// Result type alias for DataForge-RS operations
pub type Result<T> = std::result::Result<T, DataForgeError>;

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

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DataForgeError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DataForgeError::from(e).with_context(f()))
    }
}
