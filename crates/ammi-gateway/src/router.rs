use axum::Json;
use axum::Router;
use axum::routing::{get, post};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::webhook;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/webhook/whatsapp",
            post(webhook::receive_message).get(webhook::verify_endpoint),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Ammi - WhatsApp Health Bot is running!",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "database": "connected",
    }))
}
