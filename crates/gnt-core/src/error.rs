//! Unified error types for the topology pipeline
//!
//! Only structural corruption that cannot be repaired is raised as an error.
//! Everything recoverable goes to the [`crate::Diagnostics`] sink instead.
//!
//! # Example
//!
//! ```ignore
//! use gnt_core::{TopologyError, TopologyResult};
//!
//! fn run(path: &str) -> TopologyResult<()> {
//!     let config = TopologyConfig::load(path)?;
//!     normalize(&mut network, &mut diag)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all topology operations.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A container reference names a type that is not a container
    #[error("Invalid container type '{container_type}' referenced by {object}")]
    InvalidContainerType {
        object: String,
        container_type: String,
    },

    /// Graph shape that ingestion should never have produced
    #[error("Structural corruption at {object}: {reason}")]
    StructuralCorruption { object: String, reason: String },

    /// A live object reached export without a stable identifier
    #[error("Missing stable identifier on {object}")]
    MissingIdentifier { object: String },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using TopologyError.
pub type TopologyResult<T> = Result<T, TopologyError>;

impl From<anyhow::Error> for TopologyError {
    fn from(err: anyhow::Error) -> Self {
        TopologyError::Other(err.to_string())
    }
}

impl From<String> for TopologyError {
    fn from(s: String) -> Self {
        TopologyError::Other(s)
    }
}

impl From<&str> for TopologyError {
    fn from(s: &str) -> Self {
        TopologyError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(err: serde_json::Error) -> Self {
        TopologyError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for TopologyError {
    fn from(err: toml::de::Error) -> Self {
        TopologyError::Config(err.to_string())
    }
}
