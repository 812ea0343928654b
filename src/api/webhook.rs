//! Webhook ingress: authenticate, shape-check, enqueue, acknowledge.
//!
//! The handler never inspects event contents; anything inside the array is
//! the ingestion worker's problem. Callers see non-200 only for a bad
//! secret or a top-level shape that is not a JSON array.

use super::AppState;
use crate::db::repo::{BatchStats, Enqueued};
use crate::domain::TimeMs;
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use tracing::{debug, info};

pub const SECRET_HEADER: &str = "x-webhook-secret";

pub async fn post_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != state.config.webhook_secret {
        return Err(AppError::Unauthorized("invalid webhook secret".into()));
    }

    let parsed: serde_json::Value = serde_json::from_str(&body)
        .map_err(|_| AppError::BadRequest("body must be a JSON array".into()))?;
    let Some(events) = parsed.as_array() else {
        return Err(AppError::BadRequest("body must be a JSON array".into()));
    };

    let now = TimeMs::now();

    if !state.config.ingestion_enabled {
        let stats = BatchStats {
            ignored_ingestion_disabled: events.len() as i64,
            ..Default::default()
        };
        state.repo.record_batch_stats(&stats, now).await?;
        debug!(events = events.len(), "ingestion disabled, acknowledging without enqueue");
        return Ok(Json(json!({"status": "ok", "accepted": false})));
    }

    match state.repo.enqueue_raw_event(&body, now).await? {
        Enqueued::Accepted(id) => {
            info!(event_id = id, events = events.len(), "webhook payload enqueued");
            Ok(Json(json!({"status": "ok", "accepted": true, "event_id": id})))
        }
        Enqueued::Duplicate => {
            let stats = BatchStats {
                ignored_replay: 1,
                ..Default::default()
            };
            state.repo.record_batch_stats(&stats, now).await?;
            debug!("replayed webhook payload dropped");
            Ok(Json(json!({"status": "ok", "duplicate": true})))
        }
    }
}
