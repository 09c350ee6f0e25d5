use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::state::AppState;
use sheetdex_backend::index::LinksSummary;
use sheetdex_backend::links::LinkRegistryEntry;

/// Occurrences shown by the summary
const SUMMARY_SAMPLE: usize = 5;
const MAX_LIST_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// At most this many URLs, ordered by URL
    pub limit: Option<usize>,
}

/// GET /api/links?limit=
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<ApiResponse<BTreeMap<String, LinkRegistryEntry>>> {
    let snapshot = state.index.snapshot();
    let limit = params.limit.map_or(usize::MAX, |l| l.clamp(1, MAX_LIST_LIMIT));
    let entries = snapshot
        .registry
        .iter()
        .take(limit)
        .map(|entry| (entry.url.clone(), entry.clone()))
        .collect();
    Json(ApiResponse::success(entries))
}

/// GET /api/links/summary
pub async fn links_summary(State(state): State<Arc<AppState>>) -> Json<ApiResponse<LinksSummary>> {
    Json(ApiResponse::success(state.index.links_summary(SUMMARY_SAMPLE)))
}

/// GET /api/links/lookup?url=
pub async fn lookup_link(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Json<ApiResponse<LinkRegistryEntry>> {
    let snapshot = state.index.snapshot();
    match snapshot.registry.get(params.url.trim()) {
        Some(entry) => Json(ApiResponse::success(entry.clone())),
        None => Json(ApiResponse::error("Link not found in index")),
    }
}
