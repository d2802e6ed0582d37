use axum::{extract::Extension, http::StatusCode, Json};

use crate::domains::generation::PassSummary;
use crate::server::app::AppState;

/// Run one generation pass and report what it did.
///
/// Job failures are part of a successful pass; 500 means the pass itself
/// could not poll the queue.
pub async fn run_pass_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<PassSummary>) {
    let summary = state.pass.run().await;

    let status_code = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status_code, Json(summary))
}
