//! Error types for the group registry

use cells_types::ValidationError;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A group with this name already exists
    #[error("group already exists: {0}")]
    AlreadyExists(String),

    /// No group with this name
    #[error("group not found: {0}")]
    NotFound(String),

    /// Group still holds regions
    #[error("group '{name}' still contains {regions} regions")]
    NotEmpty { name: String, regions: usize },

    /// Invalid identifier or option value
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Bulk pattern could not be parsed
    #[error("invalid region pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Bulk pattern selected too many regions
    #[error("pattern matched {matched} regions, the maximum is {max}")]
    TooManyMatches { matched: usize, max: usize },

    /// Persistence backend failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Table (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(e: serde_yaml::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
