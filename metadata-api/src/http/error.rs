//! The single top-level exception interceptor (§7, §10.4): every handler
//! error becomes one of these variants, which map to the documented status
//! codes. Anything not already typed becomes an opaque 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{MetadataError, QueryError};

#[derive(Debug)]
pub enum ApiError {
    Auth,
    NotFound,
    QueryValidation(String),
    Internal,
}

impl From<MetadataError> for ApiError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::UnknownPath(_) | MetadataError::HiddenPath(_) => ApiError::NotFound,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::QueryValidationError(msg) => ApiError::QueryValidation(msg),
            QueryError::Metadata(m) => m.into(),
            QueryError::Sql(err) => {
                tracing::error!(target: "conseil::http", error = %err, "query execution failed");
                ApiError::Internal
            }
            QueryError::Timeout => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Auth => (StatusCode::UNAUTHORIZED, json!({"message": "missing or invalid apiKey"})),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({"message": "not found"})),
            ApiError::QueryValidation(msg) => (StatusCode::BAD_REQUEST, json!({"message": msg})),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "serverResource failed"}),
            ),
        };
        (status, Json(body)).into_response()
    }
}
