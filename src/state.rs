//! Application state / Trạng thái ứng dụng

use std::sync::Arc;

use sheetdex_backend::config::AppConfig;
use sheetdex_backend::index::IndexService;
use sheetdex_backend::search::SearchEngine;
use sheetdex_backend::source;

/// Shared by every handler
pub struct AppState {
    pub index: Arc<IndexService>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let source = source::from_config(&config.source);
        let engine = SearchEngine::new().with_snippet_window(config.search.snippet_window);
        Self {
            index: Arc::new(IndexService::new(source).with_engine(engine)),
        }
    }
}
