use thiserror::Error;

/// Distinct from `DecodeError`: transient connection failures are retried at
/// this layer with exponential backoff; decode failures never are.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("node unreachable after retry budget exhausted: {0}")]
    NetworkError(String),
    #[error("malformed RPC payload: {0}")]
    DecodeError(String),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::NetworkError(_))
    }
}
