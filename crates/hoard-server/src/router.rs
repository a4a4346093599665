use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler::{self, AppState};

/// Build the axum router with all Hoard endpoints.
///
/// Routes are served at `/` and, when configured, again under
/// `config.mount_prefix`.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/upload/", post(handler::upload_handler))
        .route("/download/:file_hash", get(handler::download_handler))
        .route("/remove/:file_hash", delete(handler::remove_handler))
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .with_state(state);

    let app = if config.mount_prefix.is_empty() {
        api
    } else {
        Router::new()
            .nest(&config.mount_prefix, api.clone())
            .merge(api)
    };
    app.layer(TraceLayer::new_for_http())
}
