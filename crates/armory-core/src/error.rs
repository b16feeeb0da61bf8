//! Error types for armory-core

use thiserror::Error;

/// Result type alias using armory-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy for Armory
///
/// A single tool's failure at any stage is isolated and recorded in the
/// ledger; only `CatalogNotFound`/`InvalidCatalog` abort a whole run.
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog file not found
    #[error("Catalog file not found: {path}")]
    CatalogNotFound { path: String },

    /// Structurally invalid catalog entry (fatal to the run)
    #[error("Invalid catalog entry: {message}")]
    InvalidCatalog { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source acquisition (clone/download) could not complete
    #[error("Acquisition failed for {tool}: {message}")]
    Acquisition { tool: String, message: String },

    /// Chosen build/install recipe exited nonzero after retries
    #[error("Strategy {strategy} failed for {tool}: {message}")]
    Strategy {
        tool: String,
        strategy: String,
        message: String,
    },

    /// Bounded operation did not finish in time
    #[error("Operation timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// A blocking package could not be removed before the target install
    #[error("Conflicting package could not be removed: {blocking}")]
    Conflict { blocking: String },

    /// No strategy predicate matched the acquired tree
    #[error("No installation strategy matched for {tool}")]
    Indeterminate { tool: String },
}

impl Error {
    /// Create a catalog not found error
    pub fn catalog_not_found(path: impl Into<String>) -> Self {
        Self::CatalogNotFound { path: path.into() }
    }

    /// Create an invalid catalog error
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            message: message.into(),
        }
    }

    /// Create an acquisition failure
    pub fn acquisition(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Acquisition {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a strategy failure
    pub fn strategy(
        tool: impl Into<String>,
        strategy: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Strategy {
            tool: tool.into(),
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create a conflict failure citing the blocking package
    pub fn conflict(blocking: impl Into<String>) -> Self {
        Self::Conflict {
            blocking: blocking.into(),
        }
    }

    /// Create an indeterminate-strategy error
    pub fn indeterminate(tool: impl Into<String>) -> Self {
        Self::Indeterminate { tool: tool.into() }
    }
}
