//! Music ingestion, play info and stream endpoints.

use super::error::ApiError;
use super::state::{GuardedCatalogService, GuardedStreamProxy, ServerState};
use crate::catalog::{CatalogError, PlayInfo};
use crate::music_store::{MusicAsset, MusicMetadata};
use crate::playback::ProxiedAudio;
use crate::resolver::SearchPage;
use anyhow::anyhow;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, error};

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    #[serde(alias = "msg")]
    pub keyword: Option<String>,
    #[serde(alias = "pageNum")]
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl SearchQuery {
    fn keyword(&self) -> Result<&str, ApiError> {
        match self.keyword.as_deref().map(str::trim) {
            Some(keyword) if !keyword.is_empty() => Ok(keyword),
            _ => Err(ApiError::BadRequest("keyword is required".to_string())),
        }
    }
}

/// The parse keeps running on its own task when the client hangs up, so an
/// interrupted request never leaves a half finished run behind.
async fn parse_music(
    State(catalog): State<GuardedCatalogService>,
    body: Result<Json<MusicMetadata>, JsonRejection>,
) -> Result<Json<MusicAsset>, ApiError> {
    let Json(metadata) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    debug!("Parse requested for {}", metadata.external_id);

    let handle = tokio::spawn(async move { catalog.parse_and_save(metadata).await });
    let asset = handle.await.map_err(|e| {
        error!("Parse task failed: {}", e);
        CatalogError::Store(anyhow!("parse task failed: {}", e))
    })??;

    Ok(Json(asset))
}

async fn get_play_info(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<i64>,
) -> Result<Json<PlayInfo>, ApiError> {
    match catalog.get_play_info(id)? {
        Some(info) => Ok(Json(info)),
        None => Err(ApiError::NotFound(format!("music {} not found", id))),
    }
}

async fn stream_music(
    State(proxy): State<GuardedStreamProxy>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<ProxiedAudio, ApiError> {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    Ok(proxy.open(id, range).await?)
}

async fn search(
    State(catalog): State<GuardedCatalogService>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>, ApiError> {
    let keyword = query.keyword()?;
    let page = catalog
        .search(
            keyword,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

/// Parses the best match for a keyword in one call.
async fn quick_search(
    State(catalog): State<GuardedCatalogService>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<MusicAsset>, ApiError> {
    let keyword = query.keyword()?.to_string();
    let handle = tokio::spawn(async move { catalog.search_and_parse(&keyword).await });
    let found = handle
        .await
        .map_err(|e| CatalogError::Store(anyhow!("quick parse task failed: {}", e)))??;

    found
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no matching song".to_string()))
}

pub fn make_music_routes(state: ServerState) -> Router {
    Router::new()
        .route("/music/parse", post(parse_music))
        .route("/music/{id}/play", get(get_play_info))
        .route("/music/{id}/stream", get(stream_music))
        .route("/search", get(search))
        .route("/search/quick", get(quick_search))
        .with_state(state)
}
