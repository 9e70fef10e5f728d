//! HTTP router: one route per `spec.md` §6 endpoint, CORS + request
//! tracing layered the way the teacher's `create_router` does.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/fs", get(handlers::fs::list_fs))
        .route("/paths", get(handlers::paths::list_paths))
        .route("/paths/scan", post(handlers::paths::trigger_scan))
        .route("/processes", get(handlers::processes::list_processes))
        .route("/logs", get(handlers::logs::list_logs))
        .route("/logs/files", get(handlers::logs::list_log_files))
        .route(
            "/config",
            get(handlers::config::get_config).put(handlers::config::put_config),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}
