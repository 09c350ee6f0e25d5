use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::state::AppState;
use sheetdex_backend::config;
use sheetdex_backend::index::{IndexStatus, RebuildStats};

#[derive(Debug, Deserialize)]
pub struct RebuildParams {
    pub deep: Option<bool>,
}

/// POST /api/admin/index/rebuild?deep=
pub async fn rebuild_index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RebuildParams>,
) -> Json<ApiResponse<RebuildStats>> {
    if state.index.is_rebuilding() {
        return Json(ApiResponse::error("Index rebuild already running"));
    }

    let deep = params.deep.unwrap_or_else(|| config::get_config().read().index.deep);
    let index = state.index.clone();
    // Detached so a dropped request does not abort the rebuild halfway
    let task = tokio::spawn(async move { index.try_rebuild_index(deep).await });

    match task.await {
        Ok(Some(stats)) => Json(ApiResponse::success(stats)),
        Ok(None) => Json(ApiResponse::error("Index rebuild already running")),
        Err(e) => {
            tracing::error!("Rebuild task failed: {}", e);
            Json(ApiResponse::error(&format!("Rebuild failed: {}", e)))
        }
    }
}

/// GET /api/admin/index/status
pub async fn get_index_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<IndexStatus>> {
    Json(ApiResponse::success(state.index.status()))
}

/// GET /api/admin/index/stats - per-sheet stats of the last rebuild
pub async fn get_index_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<RebuildStats>> {
    Json(ApiResponse::success(state.index.last_stats()))
}
