use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/api/upload/", post(crate::routes_datasets::post_upload))
        .route("/api/history/", get(crate::routes_datasets::get_history))
        .route("/api/summary/:id/", get(crate::routes_summary::get_summary))
        .route("/api/pdf/:id/", get(crate::routes_report::get_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_token));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(api)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
