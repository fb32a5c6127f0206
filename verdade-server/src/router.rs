//! Router setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/api/verify", post(handlers::verify))
        .route("/health", get(handlers::health_check))
        .layer(body_limit)
        .with_state(state)
}
