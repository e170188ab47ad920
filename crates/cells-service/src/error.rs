//! Service-level errors

use cells_links::LinkError;
use cells_registry::RegistryError;
use cells_types::{ExternalError, ValidationError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Links(#[from] LinkError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("could not install log subscriber: {0}")]
    Telemetry(String),

    #[error("too many '{action}' requests, try again later")]
    RateLimited { action: &'static str },

    #[error("missing capability '{capability}'")]
    PermissionDenied { capability: String },

    #[error("you do not own region '{0}'")]
    NotOwner(String),

    #[error("region not found: {0}")]
    RegionNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ServiceError {
    pub fn permission_denied(capability: impl Into<String>) -> Self {
        ServiceError::PermissionDenied {
            capability: capability.into(),
        }
    }
}
