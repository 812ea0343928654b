use super::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub events_received: i64,
    pub swaps_inserted: i64,
    pub swaps_ignored: i64,
    pub ignored_missing_fields: i64,
    pub ignored_no_swap_event: i64,
    pub ignored_no_tracked_tokens: i64,
    pub ignored_ingestion_disabled: i64,
    pub ignored_constraint_violation: i64,
    pub ignored_replay: i64,
    pub ignored_exception: i64,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let totals = state.repo.ingestion_totals().await?;

    let swaps_ignored = totals.ignored_missing_fields
        + totals.ignored_no_swap_event
        + totals.ignored_no_tracked_tokens
        + totals.ignored_ingestion_disabled
        + totals.ignored_constraint_violation
        + totals.ignored_replay
        + totals.ignored_exception;

    Ok(Json(StatsResponse {
        events_received: totals.events_received,
        swaps_inserted: totals.swaps_inserted,
        swaps_ignored,
        ignored_missing_fields: totals.ignored_missing_fields,
        ignored_no_swap_event: totals.ignored_no_swap_event,
        ignored_no_tracked_tokens: totals.ignored_no_tracked_tokens,
        ignored_ingestion_disabled: totals.ignored_ingestion_disabled,
        ignored_constraint_violation: totals.ignored_constraint_violation,
        ignored_replay: totals.ignored_replay,
        ignored_exception: totals.ignored_exception,
    }))
}
