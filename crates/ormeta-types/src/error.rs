//! Type catalog errors

use thiserror::Error;

/// Errors raised while building or loading a type catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog document is not valid JSON for the expected shape
    #[error("Failed to parse type catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read a catalog file
    #[error("Failed to read type catalog: {0}")]
    Io(#[from] std::io::Error),

    /// Two entries describe the same type
    #[error("Duplicate type in catalog: {0}")]
    DuplicateType(String),

    /// A superclass or interface reference names no known type
    #[error("Type {type_name} refers to unknown supertype {supertype}")]
    UnknownSupertype {
        /// Type holding the reference
        type_name: String,
        /// Supertype that could not be found
        supertype: String,
    },

    /// A type lists itself among its own ancestors
    #[error("Inheritance cycle detected at {0}")]
    InheritanceCycle(String),
}
