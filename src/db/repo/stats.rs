//! Ingestion statistics: one row per processed batch, summed on read.

use super::Repository;
use crate::domain::TimeMs;
use serde::Serialize;
use sqlx::Row;

/// Per-batch counters accumulated by the ingestion worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub events_received: i64,
    pub swaps_inserted: i64,
    pub ignored_missing_fields: i64,
    pub ignored_no_swap_event: i64,
    pub ignored_no_tracked_tokens: i64,
    pub ignored_ingestion_disabled: i64,
    pub ignored_constraint_violation: i64,
    pub ignored_replay: i64,
    pub ignored_exception: i64,
}

impl BatchStats {
    pub fn is_empty(&self) -> bool {
        *self == BatchStats::default()
    }

    pub fn total_ignored(&self) -> i64 {
        self.ignored_missing_fields
            + self.ignored_no_swap_event
            + self.ignored_no_tracked_tokens
            + self.ignored_ingestion_disabled
            + self.ignored_constraint_violation
            + self.ignored_replay
            + self.ignored_exception
    }
}

/// Lifetime totals served by the stats endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestionTotals {
    pub events_received: i64,
    pub swaps_inserted: i64,
    pub ignored_missing_fields: i64,
    pub ignored_no_swap_event: i64,
    pub ignored_no_tracked_tokens: i64,
    pub ignored_ingestion_disabled: i64,
    pub ignored_constraint_violation: i64,
    pub ignored_replay: i64,
    pub ignored_exception: i64,
}

impl Repository {
    /// Append one batch's counters. Skipped for all-zero batches so idle
    /// polling does not grow the table.
    pub async fn record_batch_stats(
        &self,
        stats: &BatchStats,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        if stats.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO ingestion_stats (
                recorded_ms, events_received, swaps_inserted,
                ignored_missing_fields, ignored_no_swap_event, ignored_no_tracked_tokens,
                ignored_ingestion_disabled, ignored_constraint_violation,
                ignored_replay, ignored_exception
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(now.as_ms())
        .bind(stats.events_received)
        .bind(stats.swaps_inserted)
        .bind(stats.ignored_missing_fields)
        .bind(stats.ignored_no_swap_event)
        .bind(stats.ignored_no_tracked_tokens)
        .bind(stats.ignored_ingestion_disabled)
        .bind(stats.ignored_constraint_violation)
        .bind(stats.ignored_replay)
        .bind(stats.ignored_exception)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn ingestion_totals(&self) -> Result<IngestionTotals, sqlx::Error> {
        let row = sqlx::query(
            "SELECT
                COALESCE(SUM(events_received), 0) AS events_received,
                COALESCE(SUM(swaps_inserted), 0) AS swaps_inserted,
                COALESCE(SUM(ignored_missing_fields), 0) AS ignored_missing_fields,
                COALESCE(SUM(ignored_no_swap_event), 0) AS ignored_no_swap_event,
                COALESCE(SUM(ignored_no_tracked_tokens), 0) AS ignored_no_tracked_tokens,
                COALESCE(SUM(ignored_ingestion_disabled), 0) AS ignored_ingestion_disabled,
                COALESCE(SUM(ignored_constraint_violation), 0) AS ignored_constraint_violation,
                COALESCE(SUM(ignored_replay), 0) AS ignored_replay,
                COALESCE(SUM(ignored_exception), 0) AS ignored_exception
             FROM ingestion_stats",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(IngestionTotals {
            events_received: row.get("events_received"),
            swaps_inserted: row.get("swaps_inserted"),
            ignored_missing_fields: row.get("ignored_missing_fields"),
            ignored_no_swap_event: row.get("ignored_no_swap_event"),
            ignored_no_tracked_tokens: row.get("ignored_no_tracked_tokens"),
            ignored_ingestion_disabled: row.get("ignored_ingestion_disabled"),
            ignored_constraint_violation: row.get("ignored_constraint_violation"),
            ignored_replay: row.get("ignored_replay"),
            ignored_exception: row.get("ignored_exception"),
        })
    }
}
