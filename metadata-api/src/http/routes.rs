//! Router assembly for the discovery and data-query surfaces (§6, §10.4).
//! `main.rs` only binds the listener; all routing lives here.

use axum::extract::{Path, Query as QueryExtractor, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::auth::require_api_key;
use super::error::ApiError;
use crate::metadata_service::MetadataService;
use crate::query::engine::AttributeQueryEngine;
use crate::query::Query as AttributeQuery;

#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<MetadataService>,
    pub engine: Arc<AttributeQueryEngine>,
}

pub fn router(state: AppState, api_keys: HashSet<String>) -> Router {
    Router::new()
        .route("/v2/metadata/platforms", get(list_platforms))
        .route("/v2/metadata/:platform/networks", get(list_networks))
        .route("/v2/metadata/:platform/:network/entities", get(list_entities))
        .route(
            "/v2/metadata/:platform/:network/:entity/attributes",
            get(list_attributes),
        )
        .route(
            "/v2/metadata/:platform/:network/:entity/:attribute",
            get(attribute_values),
        )
        .route("/v2/data/:platform/:network/:entity", post(run_query))
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(api_keys),
            require_api_key,
        ))
        .with_state(state)
}

async fn list_platforms(State(state): State<AppState>) -> Json<Vec<crate::metadata_service::PlatformView>> {
    Json(state.metadata.list_platforms())
}

async fn list_networks(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Result<Json<Vec<crate::metadata_service::NetworkView>>, ApiError> {
    Ok(Json(state.metadata.list_networks(&platform)?))
}

async fn list_entities(
    State(state): State<AppState>,
    Path((platform, network)): Path<(String, String)>,
) -> Result<Json<Vec<crate::metadata_service::EntityView>>, ApiError> {
    Ok(Json(state.metadata.list_entities(&platform, &network)?))
}

async fn list_attributes(
    State(state): State<AppState>,
    Path((platform, network, entity)): Path<(String, String, String)>,
) -> Result<Json<Vec<crate::metadata_service::AttributeView>>, ApiError> {
    Ok(Json(state.metadata.list_attributes(&platform, &network, &entity)?))
}

#[derive(Debug, Deserialize)]
struct PrefixParam {
    prefix: Option<String>,
}

async fn attribute_values(
    State(state): State<AppState>,
    Path((platform, network, entity, attribute)): Path<(String, String, String, String)>,
    QueryExtractor(params): QueryExtractor<PrefixParam>,
) -> Result<Json<Vec<String>>, ApiError> {
    let values = state
        .engine
        .attribute_values(&platform, &network, &entity, &attribute, params.prefix.as_deref())
        .await?;
    Ok(Json(values))
}

async fn run_query(
    State(state): State<AppState>,
    Path((platform, network, entity)): Path<(String, String, String)>,
    Json(query): Json<AttributeQuery>,
) -> Result<Json<Vec<serde_json::Map<String, serde_json::Value>>>, ApiError> {
    let rows = state.engine.run(&platform, &network, &entity, query).await?;
    Ok(Json(rows))
}
