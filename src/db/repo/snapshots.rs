//! Immutable feature snapshot storage.
//!
//! Features and their score land in one INSERT so a snapshot can never
//! exist half-written; UNIQUE(mint, feature_version) turns a concurrent
//! second computation into an "already snapped" signal.

use super::{is_unique_violation, Repository};
use crate::domain::{
    Decimal, FeatureSnapshot, FeatureVector, MarketPhase, Mint, ScoreLabel, ScoreRecord, TimeMs,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn get_feature(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let s: String = row.get(col);
    Decimal::from_str_canonical(&s)
        .map_err(|e| sqlx::Error::Decode(format!("invalid {} column: {}", col, e).into()))
}

fn map_snapshot_row(row: &SqliteRow) -> Result<FeatureSnapshot, sqlx::Error> {
    let phase_str: String = row.get("market_phase");
    let phase = MarketPhase::parse(&phase_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("invalid market_phase: {}", phase_str).into())
    })?;

    let label_str: String = row.get("score_label");
    let label = ScoreLabel::parse(&label_str)
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid score_label: {}", label_str).into()))?;

    Ok(FeatureSnapshot {
        id: row.get("id"),
        mint: Mint::new(row.get::<String, _>("mint")),
        feature_version: row.get("feature_version"),
        pair_scoped: row.get::<i64, _>("pair_scoped") != 0,
        snapshot_ms: TimeMs::new(row.get("snapshot_ms")),
        features: FeatureVector {
            volume_acceleration: get_feature(row, "volume_acceleration")?,
            volume_growth_1h: get_feature(row, "volume_growth_1h")?,
            trade_frequency_ratio: get_feature(row, "trade_frequency_ratio")?,
            liquidity_growth_rate: get_feature(row, "liquidity_growth_rate")?,
            liquidity_volatility: get_feature(row, "liquidity_volatility")?,
            liquidity_stability: get_feature(row, "liquidity_stability")?,
            unique_wallet_growth: get_feature(row, "unique_wallet_growth")?,
            buy_sell_ratio: get_feature(row, "buy_sell_ratio")?,
            holder_concentration_top10: get_feature(row, "holder_concentration_top10")?,
            wallet_entropy: get_feature(row, "wallet_entropy")?,
            early_wallet_retention: get_feature(row, "early_wallet_retention")?,
            early_wallet_accumulation: get_feature(row, "early_wallet_accumulation")?,
            price_volatility_1h: get_feature(row, "price_volatility_1h")?,
            drawdown_depth_1h: get_feature(row, "drawdown_depth_1h")?,
            volume_collapse_ratio: get_feature(row, "volume_collapse_ratio")?,
            trade_count_1h: get_feature(row, "trade_count_1h")?,
        },
        score: ScoreRecord {
            momentum: row.get("score_momentum"),
            liquidity: row.get("score_liquidity"),
            participation: row.get("score_participation"),
            wallet: row.get("score_wallet"),
            risk_penalty: row.get("score_risk_penalty"),
            total: row.get("score_total"),
            label,
            phase,
        },
    })
}

const SNAPSHOT_COLUMNS: &str = "id, mint, feature_version, pair_scoped, snapshot_ms, \
    volume_acceleration, volume_growth_1h, trade_frequency_ratio, liquidity_growth_rate, \
    liquidity_volatility, liquidity_stability, unique_wallet_growth, buy_sell_ratio, \
    holder_concentration_top10, wallet_entropy, early_wallet_retention, \
    early_wallet_accumulation, price_volatility_1h, drawdown_depth_1h, \
    volume_collapse_ratio, trade_count_1h, market_phase, score_momentum, score_liquidity, \
    score_participation, score_wallet, score_risk_penalty, score_total, score_label";

impl Repository {
    /// Persist a snapshot with its score. Returns the new row id, or
    /// `None` when this (mint, version) already has one.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_snapshot(
        &self,
        mint: &Mint,
        feature_version: i32,
        pair_scoped: bool,
        snapshot_ms: TimeMs,
        features: &FeatureVector,
        score: &ScoreRecord,
    ) -> Result<Option<i64>, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO feature_snapshots (
                mint, feature_version, pair_scoped, snapshot_ms,
                volume_acceleration, volume_growth_1h, trade_frequency_ratio,
                liquidity_growth_rate, liquidity_volatility, liquidity_stability,
                unique_wallet_growth, buy_sell_ratio, holder_concentration_top10,
                wallet_entropy, early_wallet_retention, early_wallet_accumulation,
                price_volatility_1h, drawdown_depth_1h, volume_collapse_ratio,
                trade_count_1h, market_phase, score_momentum, score_liquidity,
                score_participation, score_wallet, score_risk_penalty, score_total,
                score_label
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mint.as_str())
        .bind(feature_version)
        .bind(pair_scoped as i64)
        .bind(snapshot_ms.as_ms())
        .bind(features.volume_acceleration.to_canonical_string())
        .bind(features.volume_growth_1h.to_canonical_string())
        .bind(features.trade_frequency_ratio.to_canonical_string())
        .bind(features.liquidity_growth_rate.to_canonical_string())
        .bind(features.liquidity_volatility.to_canonical_string())
        .bind(features.liquidity_stability.to_canonical_string())
        .bind(features.unique_wallet_growth.to_canonical_string())
        .bind(features.buy_sell_ratio.to_canonical_string())
        .bind(features.holder_concentration_top10.to_canonical_string())
        .bind(features.wallet_entropy.to_canonical_string())
        .bind(features.early_wallet_retention.to_canonical_string())
        .bind(features.early_wallet_accumulation.to_canonical_string())
        .bind(features.price_volatility_1h.to_canonical_string())
        .bind(features.drawdown_depth_1h.to_canonical_string())
        .bind(features.volume_collapse_ratio.to_canonical_string())
        .bind(features.trade_count_1h.to_canonical_string())
        .bind(score.phase.as_str())
        .bind(score.momentum)
        .bind(score.liquidity)
        .bind(score.participation)
        .bind(score.wallet)
        .bind(score.risk_penalty)
        .bind(score.total)
        .bind(score.label.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(Some(done.last_insert_rowid())),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn get_snapshot(
        &self,
        mint: &Mint,
        feature_version: i32,
    ) -> Result<Option<FeatureSnapshot>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM feature_snapshots WHERE mint = ? AND feature_version = ?",
            SNAPSHOT_COLUMNS
        ))
        .bind(mint.as_str())
        .bind(feature_version)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_snapshot_row).transpose()
    }

    /// Snapshots that have no lifecycle label yet, for the label worker.
    pub async fn list_unlabeled_snapshots(
        &self,
        feature_version: i32,
    ) -> Result<Vec<FeatureSnapshot>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM feature_snapshots s
             WHERE s.feature_version = ?
               AND NOT EXISTS (
                   SELECT 1 FROM lifecycle_labels l WHERE l.snapshot_id = s.id
               )
             ORDER BY s.snapshot_ms ASC",
            SNAPSHOT_COLUMNS
        ))
        .bind(feature_version)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_snapshot_row).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_repo;
    use super::test_fixtures::{sample_features, sample_score};
    use super::*;

    #[tokio::test]
    async fn test_insert_and_fetch_snapshot() {
        let (repo, _temp) = setup_test_repo().await;
        let mint = Mint::new("MINT_A");

        let id = repo
            .insert_snapshot(
                &mint,
                1,
                false,
                TimeMs::new(10_000),
                &sample_features(),
                &sample_score(),
            )
            .await
            .unwrap()
            .expect("first insert wins");

        let snapshot = repo.get_snapshot(&mint, 1).await.unwrap().unwrap();
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.features, sample_features());
        assert_eq!(snapshot.score, sample_score());
        assert!(!snapshot.pair_scoped);
    }

    #[tokio::test]
    async fn test_second_snapshot_for_same_version_rejected() {
        let (repo, _temp) = setup_test_repo().await;
        let mint = Mint::new("MINT_A");

        let first = repo
            .insert_snapshot(
                &mint,
                1,
                false,
                TimeMs::new(10_000),
                &sample_features(),
                &sample_score(),
            )
            .await
            .unwrap();
        assert!(first.is_some());

        let second = repo
            .insert_snapshot(
                &mint,
                1,
                false,
                TimeMs::new(20_000),
                &sample_features(),
                &sample_score(),
            )
            .await
            .unwrap();
        assert_eq!(second, None);

        // A new feature version is a separate snapshot.
        let v2 = repo
            .insert_snapshot(
                &mint,
                2,
                false,
                TimeMs::new(20_000),
                &sample_features(),
                &sample_score(),
            )
            .await
            .unwrap();
        assert!(v2.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_update_rejected_by_trigger() {
        let (repo, _temp) = setup_test_repo().await;
        let mint = Mint::new("MINT_A");

        let id = repo
            .insert_snapshot(
                &mint,
                1,
                false,
                TimeMs::new(10_000),
                &sample_features(),
                &sample_score(),
            )
            .await
            .unwrap()
            .unwrap();

        let err = sqlx::query("UPDATE feature_snapshots SET score_total = 99.0 WHERE id = ?")
            .bind(id)
            .execute(&repo.pool)
            .await
            .expect_err("update must fail");
        assert!(err.to_string().contains("immutable"));
    }

    #[tokio::test]
    async fn test_list_unlabeled_snapshots() {
        let (repo, _temp) = setup_test_repo().await;

        for mint in ["MINT_A", "MINT_B"] {
            repo.insert_snapshot(
                &Mint::new(mint),
                1,
                false,
                TimeMs::new(10_000),
                &sample_features(),
                &sample_score(),
            )
            .await
            .unwrap();
        }

        let unlabeled = repo.list_unlabeled_snapshots(1).await.unwrap();
        assert_eq!(unlabeled.len(), 2);
    }
}
