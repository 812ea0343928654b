//! Lifecycle label storage. One label per snapshot, forever.

use super::Repository;
use crate::domain::{Decimal, LifecycleLabel, Mint, Outcome, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn map_label_row(row: &SqliteRow) -> Result<LifecycleLabel, sqlx::Error> {
    let outcome_str: String = row.get("outcome");
    let outcome = Outcome::parse(&outcome_str)
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid outcome: {}", outcome_str).into()))?;

    let mult: String = row.get("max_multiplier");
    let max_multiplier = Decimal::from_str_canonical(&mult)
        .map_err(|e| sqlx::Error::Decode(format!("invalid max_multiplier: {}", e).into()))?;

    Ok(LifecycleLabel {
        snapshot_id: row.get("snapshot_id"),
        mint: Mint::new(row.get::<String, _>("mint")),
        outcome,
        max_multiplier,
        time_to_outcome_ms: row.get("time_to_outcome_ms"),
        labeled_ms: TimeMs::new(row.get("labeled_ms")),
    })
}

impl Repository {
    /// Write a label. Returns false when the snapshot already has one;
    /// the first resolution stands.
    pub async fn insert_label(&self, label: &LifecycleLabel) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO lifecycle_labels
                 (snapshot_id, mint, outcome, max_multiplier, time_to_outcome_ms, labeled_ms)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(snapshot_id) DO NOTHING",
        )
        .bind(label.snapshot_id)
        .bind(label.mint.as_str())
        .bind(label.outcome.as_str())
        .bind(label.max_multiplier.to_canonical_string())
        .bind(label.time_to_outcome_ms)
        .bind(label.labeled_ms.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_label_for_snapshot(
        &self,
        snapshot_id: i64,
    ) -> Result<Option<LifecycleLabel>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT snapshot_id, mint, outcome, max_multiplier, time_to_outcome_ms, labeled_ms
             FROM lifecycle_labels WHERE snapshot_id = ?",
        )
        .bind(snapshot_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_label_row).transpose()
    }

    pub async fn count_labels(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lifecycle_labels")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_repo;
    use super::*;

    fn make_label(snapshot_id: i64, outcome: Outcome) -> LifecycleLabel {
        LifecycleLabel {
            snapshot_id,
            mint: Mint::new("MINT_A"),
            outcome,
            max_multiplier: Decimal::from_str_canonical("5.2").unwrap(),
            time_to_outcome_ms: Some(7_200_000),
            labeled_ms: TimeMs::new(50_000),
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_label() {
        let (repo, _temp) = setup_test_repo().await;

        let label = make_label(1, Outcome::Success);
        assert!(repo.insert_label(&label).await.unwrap());

        let fetched = repo.get_label_for_snapshot(1).await.unwrap().unwrap();
        assert_eq!(fetched, label);
    }

    #[tokio::test]
    async fn test_second_label_for_snapshot_rejected() {
        let (repo, _temp) = setup_test_repo().await;

        assert!(repo
            .insert_label(&make_label(1, Outcome::Success))
            .await
            .unwrap());
        assert!(!repo
            .insert_label(&make_label(1, Outcome::PriceFailure))
            .await
            .unwrap());

        let fetched = repo.get_label_for_snapshot(1).await.unwrap().unwrap();
        assert_eq!(fetched.outcome, Outcome::Success, "first resolution stands");
        assert_eq!(repo.count_labels().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_label_update_rejected_by_trigger() {
        let (repo, _temp) = setup_test_repo().await;
        repo.insert_label(&make_label(1, Outcome::Expired))
            .await
            .unwrap();

        let err = sqlx::query("UPDATE lifecycle_labels SET outcome = 'success' WHERE snapshot_id = 1")
            .execute(&repo.pool)
            .await
            .expect_err("update must fail");
        assert!(err.to_string().contains("immutable"));

        let err = sqlx::query("DELETE FROM lifecycle_labels WHERE snapshot_id = 1")
            .execute(&repo.pool)
            .await
            .expect_err("delete must fail");
        assert!(err.to_string().contains("immutable"));
    }
}
