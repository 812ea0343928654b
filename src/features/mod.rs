//! Feature snapshot engine: computes the windowed feature vector for a
//! freshly promoted token and persists it, scored, in one insert.

pub mod compute;

pub use compute::compute_features;

use crate::db::Repository;
use crate::domain::{FeatureConfig, Mint, TimeMs, Token};
use crate::scoring;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("token {0} has no detection timestamp")]
    NotDetected(Mint),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub struct FeatureEngine {
    repo: Arc<Repository>,
    config: FeatureConfig,
}

impl FeatureEngine {
    pub fn new(repo: Arc<Repository>, config: FeatureConfig) -> Self {
        FeatureEngine { repo, config }
    }

    /// Compute, score, and persist the snapshot for a detected token.
    ///
    /// The snapshot is stamped with `detected_ms`, not the wall clock, so
    /// a re-run against the same trades is bit-identical. Returns `None`
    /// when this (token, feature_version) already has a snapshot.
    pub async fn snapshot(&self, token: &Token) -> Result<Option<i64>, FeatureError> {
        let detected_ms = token
            .detected_ms
            .ok_or_else(|| FeatureError::NotDetected(token.mint.clone()))?;

        // Inclusive cutoff: trades stamped exactly at detection count.
        let cutoff = TimeMs::new(detected_ms.as_ms() + 1);
        let trades = self.repo.trades_until(&token.mint, cutoff).await?;

        let features = compute_features(
            &trades,
            detected_ms,
            token.first_trade_ms,
            token.peak_liquidity,
        );
        let score = scoring::compute_score(&features);

        let inserted = self
            .repo
            .insert_snapshot(
                &token.mint,
                self.config.version,
                self.config.pair_scoped,
                detected_ms,
                &features,
                &score,
            )
            .await?;

        match inserted {
            Some(id) => info!(
                mint = %token.mint,
                snapshot_id = id,
                version = self.config.version,
                total = score.total,
                phase = score.phase.as_str(),
                "feature snapshot created"
            ),
            None => info!(
                mint = %token.mint,
                version = self.config.version,
                "snapshot already exists, skipping"
            ),
        }
        Ok(inserted)
    }
}
