use crate::db::DbError;
use lorre_node_client::ClientError;
use thiserror::Error;

/// §7: processors never swallow errors; they wrap with context and propagate.
/// Only `IndexerLoop` decides whether a `ProcessingError` is fatal.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("block processing failed: {message}")]
    BlocksProcessingFailed {
        message: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("accounts processing failed: {0}")]
    AccountsProcessingFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("bakers processing failed: {0}")]
    BakersProcessingFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<DbError> for ProcessingError {
    fn from(e: DbError) -> Self {
        ProcessingError::BlocksProcessingFailed {
            message: "database transaction failed".to_string(),
            cause: Box::new(e),
        }
    }
}

impl From<ClientError> for ProcessingError {
    fn from(e: ClientError) -> Self {
        ProcessingError::BlocksProcessingFailed {
            message: "node client call failed".to_string(),
            cause: Box::new(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required argument: {0}")]
    MissingArgument(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
