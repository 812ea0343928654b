//! Eligibility gate: the per-token state machine between first sighting
//! and active monitoring.
//!
//! `PreEligible -> EligiblePendingSustain` when liquidity first reaches
//! the threshold; `-> ActiveMonitoring` when it holds for the full
//! sustain window AND the filter chain passes. Promotion freezes
//! `detected_ms = crossed_ms + sustain`, never the pass's wall clock, so
//! a delayed worker does not shift downstream windows.

pub mod filters;

use crate::db::Repository;
use crate::domain::{Decimal, LifecycleStage, TimeMs, Token, Trade};
use crate::features::{FeatureEngine, FeatureError};
use filters::{FilterContext, MIN_LIQUIDITY_USD};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const LIQUIDITY_SUSTAIN_MINUTES: i64 = 30;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] FeatureError),
}

/// Where a token stands relative to the liquidity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrossState {
    /// Never crossed, or every crossing so far was broken by a dip.
    NotCrossed,
    /// Crossed at the instant given; the sustain window is still open.
    Pending(TimeMs),
    /// Crossed and held for the full sustain window.
    Sustained(TimeMs),
}

pub struct GateWorker {
    repo: Arc<Repository>,
    features: FeatureEngine,
}

impl GateWorker {
    pub fn new(repo: Arc<Repository>, features: FeatureEngine) -> Self {
        GateWorker { repo, features }
    }

    /// Evaluate every non-terminal, non-active token against the gate.
    /// Returns the number of tokens promoted this pass. Per-token failures
    /// are logged and skipped.
    pub async fn run_pass(&self, now: TimeMs) -> Result<usize, GateError> {
        let mut candidates = self
            .repo
            .list_tokens_by_stage(LifecycleStage::PreEligible)
            .await?;
        candidates.extend(
            self.repo
                .list_tokens_by_stage(LifecycleStage::EligiblePendingSustain)
                .await?,
        );

        let mut promoted = 0;
        for token in &candidates {
            match self.evaluate_token(token, now).await {
                Ok(true) => promoted += 1,
                Ok(false) => {}
                Err(err) => warn!(mint = %token.mint, %err, "gate evaluation failed"),
            }
        }
        if promoted > 0 {
            info!(promoted, evaluated = candidates.len(), "gate pass complete");
        }
        Ok(promoted)
    }

    async fn evaluate_token(&self, token: &Token, now: TimeMs) -> Result<bool, GateError> {
        // Trades with time_ms <= now; the bound is inclusive.
        let cutoff = TimeMs::new(now.as_ms() + 1);
        let trades = self.repo.trades_until(&token.mint, cutoff).await?;

        match sustained_crossing(&trades, now) {
            CrossState::NotCrossed => {
                if token.stage == LifecycleStage::EligiblePendingSustain {
                    debug!(mint = %token.mint, "liquidity dipped, sustain reset");
                    self.repo.reset_sustain(&token.mint).await?;
                }
                Ok(false)
            }
            CrossState::Pending(crossed_ms) => {
                if token.liquidity_crossed_ms != Some(crossed_ms) {
                    info!(mint = %token.mint, crossed_ms = crossed_ms.as_ms(), "liquidity threshold crossed");
                    self.repo
                        .mark_liquidity_crossed(&token.mint, crossed_ms)
                        .await?;
                }
                Ok(false)
            }
            CrossState::Sustained(crossed_ms) => {
                self.try_promote(token, &trades, crossed_ms).await
            }
        }
    }

    async fn try_promote(
        &self,
        token: &Token,
        trades: &[Trade],
        crossed_ms: TimeMs,
    ) -> Result<bool, GateError> {
        let ctx = FilterContext { token, trades };
        if let Some(reason) = filters::first_failure(&ctx) {
            debug!(mint = %token.mint, reason, "held back by filter");
            // Keep the crossing on record; the token is re-evaluated
            // next pass once more trades land.
            if token.liquidity_crossed_ms != Some(crossed_ms) {
                self.repo
                    .mark_liquidity_crossed(&token.mint, crossed_ms)
                    .await?;
            }
            return Ok(false);
        }

        let detected_ms = crossed_ms.plus_minutes(LIQUIDITY_SUSTAIN_MINUTES);
        let baseline_price = trades
            .iter()
            .find(|t| t.time_ms >= detected_ms && t.price.is_positive())
            .map(|t| t.price);

        let won = self
            .repo
            .promote_to_active(&token.mint, detected_ms, baseline_price)
            .await?;
        if !won {
            // Another pass promoted it between listing and now.
            return Ok(false);
        }

        info!(
            mint = %token.mint,
            detected_ms = detected_ms.as_ms(),
            "token enters active monitoring"
        );

        let promoted = self
            .repo
            .get_token(&token.mint)
            .await?
            .unwrap_or_else(|| token.clone());
        self.features.snapshot(&promoted).await?;
        Ok(true)
    }
}

/// Walk the liquidity observations and find the state of the latest
/// unbroken threshold crossing.
///
/// An observation at or past `crossed + sustain` closes the window; a
/// sub-threshold print inside the window voids the crossing (a later
/// observation may start a new one).
fn sustained_crossing(trades: &[Trade], now: TimeMs) -> CrossState {
    let threshold = Decimal::from_count(MIN_LIQUIDITY_USD);
    let mut crossing: Option<TimeMs> = None;

    for trade in trades {
        let Some(liquidity) = trade.liquidity else {
            continue;
        };
        if let Some(crossed_ms) = crossing {
            if trade.time_ms >= crossed_ms.plus_minutes(LIQUIDITY_SUSTAIN_MINUTES) {
                return CrossState::Sustained(crossed_ms);
            }
            if liquidity < threshold {
                crossing = None;
            }
        }
        if crossing.is_none() && liquidity >= threshold {
            crossing = Some(trade.time_ms);
        }
    }

    match crossing {
        Some(crossed_ms) if now >= crossed_ms.plus_minutes(LIQUIDITY_SUSTAIN_MINUTES) => {
            CrossState::Sustained(crossed_ms)
        }
        Some(crossed_ms) => CrossState::Pending(crossed_ms),
        None => CrossState::NotCrossed,
    }
}
