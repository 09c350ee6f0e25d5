use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::state::AppState;
use sheetdex_backend::config;
use sheetdex_backend::search::SearchHit;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub top_k: Option<usize>,
    pub fuzz: Option<u32>,
    #[serde(default)]
    pub exact: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

/// GET /api/search?q=&top_k=&fuzz=&exact=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<ApiResponse<SearchResponse>> {
    let mut options = config::get_config().read().search.options(&params.q).exact(params.exact);
    if let Some(top_k) = params.top_k {
        options = options.with_top_k(top_k.max(1));
    }
    if let Some(fuzz) = params.fuzz {
        options = options.with_threshold(fuzz.min(100) as u8);
    }

    // Scoring fans out on rayon; keep it off the async workers
    let index = state.index.clone();
    let hits = match tokio::task::spawn_blocking(move || index.search(&options)).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::error!("Search task failed for {:?}: {}", params.q, e);
            Vec::new()
        }
    };

    Json(ApiResponse::success(SearchResponse {
        query: params.q,
        total: hits.len(),
        hits,
    }))
}
