//! HTTP surface for the LegalMate review engine.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use legalmate_core::{db::Db, engine::ReviewEngine};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod routes;

pub struct AppState {
    pub db: Arc<Db>,
    pub engine: Arc<ReviewEngine>,
    pub start_time: Instant,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(routes::health))
        // Attorneys
        .route("/attorney/create", post(routes::create_attorney))
        // Reviews
        .route("/attorney/review/submit", post(routes::submit_review))
        .route("/attorney/review/status/:review_id", get(routes::review_status))
        .route("/attorney/review/queue/:attorney_id", get(routes::attorney_queue))
        .route("/attorney/review/action", post(routes::review_action))
        .route("/attorney/review/cleanup-stuck", post(routes::cleanup_stuck))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
