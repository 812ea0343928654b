//! Repository layer: all persistence goes through here.
//!
//! The store's uniqueness constraints are the only serialization mechanism
//! across worker loops; a conflict on insert is an expected "already done"
//! signal and every insert helper surfaces it as a value, not an error.

pub mod labels;
pub mod queue;
pub mod snapshots;
pub mod stats;
pub mod tokens;
pub mod trades;

pub use queue::{Enqueued, RawEvent, RawEventStatus};
pub use stats::{BatchStats, IngestionTotals};

use sqlx::SqlitePool;

/// Tables the health endpoint verifies before reporting ready.
const REQUIRED_TABLES: [&str; 6] = [
    "raw_events",
    "trades",
    "tokens",
    "feature_snapshots",
    "lifecycle_labels",
    "ingestion_stats",
];

pub struct Repository {
    pub(crate) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Confirm store connectivity and that every required table exists.
    ///
    /// # Errors
    /// Returns an error naming the first missing table, or the underlying
    /// connectivity failure.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        for table in REQUIRED_TABLES {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_optional(&self.pool)
                    .await?;
            if row.is_none() {
                return Err(sqlx::Error::Protocol(format!(
                    "required table missing: {}",
                    table
                )));
            }
        }
        Ok(())
    }
}

/// Whether a database error is a uniqueness-constraint violation.
///
/// SQLite reports these as error codes 1555 (primary key) and 2067
/// (unique index).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|c| c == "1555" || c == "2067")
            .unwrap_or_else(|| db_err.message().contains("UNIQUE constraint failed")),
        _ => false,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_test_repo;

    #[tokio::test]
    async fn test_health_check_passes_after_migration() {
        let (repo, _temp) = setup_test_repo().await;
        repo.health_check().await.expect("health check failed");
    }

    #[tokio::test]
    async fn test_health_check_detects_missing_table() {
        let (repo, _temp) = setup_test_repo().await;

        sqlx::query("DROP TABLE ingestion_stats")
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.health_check().await.expect_err("should fail");
        assert!(err.to_string().contains("ingestion_stats"));
    }
}
