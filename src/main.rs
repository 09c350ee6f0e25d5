use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use sheetdex_backend::config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetdex_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / Đọc cấu hình
    let app_config = config::init_config()
        .map_err(anyhow::Error::msg)?
        .read()
        .clone();
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);
    tracing::info!(
        "Sheet source: {:?} at {:?}",
        app_config.source.kind,
        app_config.get_source_path()
    );

    let state = Arc::new(AppState::new(&app_config));

    if app_config.index.rebuild_on_start {
        // Build in the background; searches see an empty index until it lands
        let index = state.index.clone();
        let deep = app_config.index.deep;
        tokio::spawn(async move {
            let stats = index.rebuild_index(deep).await;
            if let Some(err) = stats.source_error {
                tracing::warn!("Startup index is empty: {}", err);
            }
        });
    }

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        .route("/api/search", get(api::search::search))
        .route("/api/links", get(api::links::list_links))
        .route("/api/links/summary", get(api::links::links_summary))
        .route("/api/links/lookup", get(api::links::lookup_link))
        .route("/api/admin/index/rebuild", post(api::admin::rebuild_index))
        .route("/api/admin/index/status", get(api::admin::get_index_status))
        .route("/api/admin/index/stats", get(api::admin::get_index_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
