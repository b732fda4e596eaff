//! Per-crate-boundary error enums (§10.3): `MetadataError` and `QueryError`.
//! Neither knows about HTTP; `http::error::ApiError` maps both to status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no such path: {0}")]
    UnknownPath(String),
    #[error("path is hidden: {0}")]
    HiddenPath(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query validation failed: {0}")]
    QueryValidationError(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("query exceeded its time budget")]
    Timeout,
}
