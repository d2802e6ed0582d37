//! Application setup and server configuration.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::domains::generation::GenerationPass;
use crate::server::routes::{health_handler, run_pass_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub pass: Arc<GenerationPass>,
}

/// Build the Axum application router
///
/// `/run` accepts GET and POST so both cron-style pingers and webhooks can
/// trigger a pass.
pub fn build_app(db_pool: PgPool, pass: Arc<GenerationPass>) -> Router {
    let app_state = AppState { db_pool, pass };

    Router::new()
        .route("/health", get(health_handler))
        .route("/run", get(run_pass_handler).post(run_pass_handler))
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
}
