//! Error handling for graphlink
//!
//! This module defines the crate-level error type and a Result alias. The
//! graph engine carries its own narrower [`GraphError`], which converts into
//! [`GraphLinkError`]. Decode failures stay inside the callbacks and never
//! reach this type.

use crate::graph::GraphError;
use thiserror::Error;

/// Main error type for graphlink operations
#[derive(Error, Debug)]
pub enum GraphLinkError {
    /// Errors raised by the graph engine
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphLinkError>,
    },
}

impl GraphLinkError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GraphLinkError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for graphlink operations
pub type Result<T> = std::result::Result<T, GraphLinkError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<GraphLinkError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
