use cells_types::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for LinkError {
    fn from(e: serde_yaml::Error) -> Self {
        LinkError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
