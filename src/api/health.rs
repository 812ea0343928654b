use super::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::error;

/// Store connectivity plus required-table presence.
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.repo.health_check().await {
        Ok(()) => Ok(Json(serde_json::json!({"status": "ok"}))),
        Err(e) => {
            error!("health check failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn ready() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ready"}))
}
