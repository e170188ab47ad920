use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Failures of the reconciliation machinery itself.
///
/// Problems found in the data are reported as findings on the result, not as
/// errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Reconciliation task failed: {0}")]
    Task(String),

    #[error("Scheduler is not running")]
    NotRunning,
}

impl From<tokio::task::JoinError> for ReconcileError {
    fn from(e: tokio::task::JoinError) -> Self {
        ReconcileError::Task(e.to_string())
    }
}
