//! API-key enforcement (§10.4): the one authentication concern this
//! repository owns. Key provisioning remains an external collaborator.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashSet;
use std::sync::Arc;

use super::error::ApiError;

pub async fn require_api_key(
    State(keys): State<Arc<HashSet<String>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get("apiKey")
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if keys.contains(key) => Ok(next.run(request).await),
        _ => Err(ApiError::Auth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::util::ServiceExt;

    fn app(keys: HashSet<String>) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(keys),
                require_api_key,
            ))
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let response = app(HashSet::from(["secret".to_string()]))
            .oneshot(HttpRequest::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_key_passes_through() {
        let response = app(HashSet::from(["secret".to_string()]))
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .header("apiKey", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let response = app(HashSet::from(["secret".to_string()]))
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .header("apiKey", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
