use thiserror::Error;

/// Rejection of a malformed identifier, option value or location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} '{value}' exceeds {max} characters")]
    TooLong {
        kind: &'static str,
        value: String,
        max: usize,
    },

    #[error("{kind} '{value}' may only contain letters, digits, '_' and '-'")]
    InvalidCharacters { kind: &'static str, value: String },

    #[error("limit {0} is below -1")]
    LimitOutOfRange(i32),

    #[error("teleport cost {0} is not a valid amount")]
    InvalidCost(f64),

    #[error("unknown teleport access mode '{0}'")]
    UnknownAccessMode(String),

    #[error("invalid location key '{0}'")]
    InvalidLocation(String),

    #[error("invalid actor id '{0}'")]
    InvalidActor(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Failure reported by an external collaborator (marketplace, economy, host).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl ExternalError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }
}
