//! Durable raw-event queue backed by the `raw_events` table.

use super::Repository;
use crate::domain::TimeMs;
use sha2::{Digest, Sha256};
use sqlx::Row;

/// Delivery attempts before an event is parked as `failed`.
pub const MAX_RETRIES: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl RawEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawEventStatus::Pending => "pending",
            RawEventStatus::Processing => "processing",
            RawEventStatus::Processed => "processed",
            RawEventStatus::Failed => "failed",
        }
    }
}

/// Result of an enqueue attempt. A replayed payload is acknowledged but
/// not stored twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted(i64),
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: i64,
    pub payload: String,
    pub payload_hash: String,
    pub status: String,
    pub retry_count: i64,
    pub error: Option<String>,
    pub created_ms: TimeMs,
    pub processed_ms: Option<TimeMs>,
}

fn payload_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

impl Repository {
    /// Append a raw webhook payload to the queue. Duplicate payloads
    /// (byte-identical, by sha256) are dropped and reported as such.
    pub async fn enqueue_raw_event(
        &self,
        payload: &str,
        now: TimeMs,
    ) -> Result<Enqueued, sqlx::Error> {
        let hash = payload_hash(payload);

        let result = sqlx::query(
            "INSERT INTO raw_events (payload, payload_hash, status, created_ms)
             VALUES (?, ?, 'pending', ?)
             ON CONFLICT(payload_hash) DO NOTHING",
        )
        .bind(payload)
        .bind(&hash)
        .bind(now.as_ms())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(Enqueued::Duplicate)
        } else {
            Ok(Enqueued::Accepted(result.last_insert_rowid()))
        }
    }

    /// Claim up to `limit` pending events, oldest first, marking them
    /// `processing` so a crashed pass leaves a visible trail.
    pub async fn dequeue_batch(&self, limit: i64) -> Result<Vec<RawEvent>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id, payload, payload_hash, status, retry_count, error, created_ms, processed_ms
             FROM raw_events
             WHERE status = 'pending'
             ORDER BY created_ms ASC, id ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let events: Vec<RawEvent> = rows
            .iter()
            .map(|row| RawEvent {
                id: row.get("id"),
                payload: row.get("payload"),
                payload_hash: row.get("payload_hash"),
                status: RawEventStatus::Processing.as_str().to_string(),
                retry_count: row.get("retry_count"),
                error: row.get("error"),
                created_ms: TimeMs::new(row.get("created_ms")),
                processed_ms: row.get::<Option<i64>, _>("processed_ms").map(TimeMs::new),
            })
            .collect();

        for event in &events {
            sqlx::query("UPDATE raw_events SET status = 'processing' WHERE id = ?")
                .bind(event.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(events)
    }

    /// Mark an event fully processed.
    pub async fn ack_raw_event(&self, id: i64, now: TimeMs) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE raw_events SET status = 'processed', processed_ms = ? WHERE id = ?")
            .bind(now.as_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a processing failure. The event returns to `pending` for
    /// another attempt until it hits the retry ceiling, then parks as
    /// `failed` for manual inspection.
    pub async fn fail_raw_event(
        &self,
        id: i64,
        reason: &str,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE raw_events
             SET retry_count = retry_count + 1,
                 error = ?,
                 processed_ms = ?,
                 status = CASE WHEN retry_count + 1 >= ? THEN 'failed' ELSE 'pending' END
             WHERE id = ?",
        )
        .bind(reason)
        .bind(now.as_ms())
        .bind(MAX_RETRIES)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_raw_event(&self, id: i64) -> Result<Option<RawEvent>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, payload, payload_hash, status, retry_count, error, created_ms, processed_ms
             FROM raw_events WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| RawEvent {
            id: row.get("id"),
            payload: row.get("payload"),
            payload_hash: row.get("payload_hash"),
            status: row.get("status"),
            retry_count: row.get("retry_count"),
            error: row.get("error"),
            created_ms: TimeMs::new(row.get("created_ms")),
            processed_ms: row.get::<Option<i64>, _>("processed_ms").map(TimeMs::new),
        }))
    }

    pub async fn count_raw_events_by_status(&self, status: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM raw_events WHERE status = ?")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
