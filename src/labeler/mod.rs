//! Label worker: resolves each snapshot to exactly one terminal outcome.
//!
//! Deterministic and idempotent. Checks run in priority order, first hit
//! wins; success is final no matter what happened afterward. All failure
//! outcomes are measured inside the 48-hour failure window, including the
//! liquidity peak they are compared against.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    Decimal, LifecycleLabel, LifecycleStage, Outcome, Side, TimeMs, Token, Trade, Wallet, HOUR_MS,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const OUTCOME_WINDOW_HOURS: i64 = 72;
pub const FAILURE_WINDOW_HOURS: i64 = 48;
/// Volume collapse is not evaluated until this much history exists.
pub const VOLUME_BUFFER_HOURS: i64 = 6;
pub const EARLY_EXIT_CHECK_HOURS: i64 = 2;
const EARLY_WINDOW_MINUTES: i64 = 30;
const VOLUME_COLLAPSE_CONSECUTIVE: u32 = 3;

fn success_multiple() -> Decimal {
    Decimal::from_count(5)
}

fn threshold(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).expect("threshold literal")
}

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// A resolved outcome, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolution {
    outcome: Outcome,
    max_multiplier: Decimal,
    time_to_outcome_ms: Option<i64>,
}

pub struct LabelWorker {
    repo: Arc<Repository>,
    config: Arc<Config>,
}

impl LabelWorker {
    pub fn new(repo: Arc<Repository>, config: Arc<Config>) -> Self {
        LabelWorker { repo, config }
    }

    /// Resolve every labelable snapshot using trades up to `now`.
    /// Returns the number of labels written. Re-running is harmless: a
    /// snapshot that already has a label is never listed again, and the
    /// label insert itself is conflict-guarded.
    pub async fn run_pass(&self, now: TimeMs) -> Result<usize, LabelError> {
        let snapshots = self
            .repo
            .list_unlabeled_snapshots(self.config.feature.version)
            .await?;

        let mut labeled = 0;
        for snapshot in &snapshots {
            let Some(token) = self.repo.get_token(&snapshot.mint).await? else {
                warn!(mint = %snapshot.mint, "snapshot without token row");
                continue;
            };
            if token.stage != LifecycleStage::ActiveMonitoring {
                continue;
            }

            match self.resolve(&token, now).await {
                Ok(Some(resolution)) => {
                    let label = LifecycleLabel {
                        snapshot_id: snapshot.id,
                        mint: token.mint.clone(),
                        outcome: resolution.outcome,
                        max_multiplier: resolution.max_multiplier,
                        time_to_outcome_ms: resolution.time_to_outcome_ms,
                        labeled_ms: now,
                    };
                    if self.repo.insert_label(&label).await? {
                        self.repo
                            .resolve_token(&token.mint, resolution.outcome.terminal_stage(), now)
                            .await?;
                        info!(
                            mint = %token.mint,
                            outcome = resolution.outcome.as_str(),
                            max_multiplier = %resolution.max_multiplier,
                            "token resolved"
                        );
                        labeled += 1;
                    }
                }
                Ok(None) => debug!(mint = %token.mint, "still unresolved"),
                Err(err) => warn!(mint = %token.mint, %err, "resolution failed"),
            }
        }
        Ok(labeled)
    }

    async fn resolve(&self, token: &Token, now: TimeMs) -> Result<Option<Resolution>, LabelError> {
        let Some(detected_ms) = token.detected_ms else {
            return Ok(None);
        };
        let window_end = detected_ms.plus_hours(OUTCOME_WINDOW_HOURS);
        let fail_deadline = detected_ms.plus_hours(FAILURE_WINDOW_HOURS);

        // Full history up to now (capped at the window end); pre-detection
        // trades stay in for net-position arithmetic.
        let cutoff = TimeMs::new(now.as_ms().min(window_end.as_ms()) + 1);
        let trades = self.repo.trades_until(&token.mint, cutoff).await?;

        let baseline = match token.baseline_price {
            Some(baseline) => Some(baseline),
            None => {
                let derived = trades
                    .iter()
                    .find(|t| t.time_ms >= detected_ms && t.price.is_positive())
                    .map(|t| t.price);
                if let Some(price) = derived {
                    // Backfill the token row so later passes and readers
                    // share the same anchor.
                    self.repo.set_baseline_price(&token.mint, price).await?;
                }
                derived
            }
        };
        let Some(baseline) = baseline else {
            // No priced trade since detection. A dud resolves only once
            // the full observation horizon has closed.
            if !token.within_horizon(now, OUTCOME_WINDOW_HOURS) {
                return Ok(Some(Resolution {
                    outcome: Outcome::Expired,
                    max_multiplier: Decimal::zero(),
                    time_to_outcome_ms: None,
                }));
            }
            return Ok(None);
        };

        let window: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.time_ms >= detected_ms)
            .collect();
        let max_price = window
            .iter()
            .map(|t| t.price)
            .fold(Decimal::zero(), |acc, p| acc.max(p));
        let max_multiplier = if max_price.is_positive() {
            max_price / baseline
        } else {
            Decimal::zero()
        };

        // 1. Success: final regardless of anything that came after.
        let target = baseline * success_multiple();
        if let Some(hit) = window.iter().find(|t| t.price >= target) {
            return Ok(Some(Resolution {
                outcome: Outcome::Success,
                max_multiplier: hit.price / baseline,
                time_to_outcome_ms: Some(hit.time_ms.as_ms() - detected_ms.as_ms()),
            }));
        }

        let fail_window: Vec<&&Trade> = window
            .iter()
            .filter(|t| t.time_ms <= fail_deadline)
            .collect();

        // 2. Price failure.
        let min_price = fail_window
            .iter()
            .filter(|t| t.price.is_positive())
            .map(|t| t.price)
            .min();
        if let Some(min_price) = min_price {
            if min_price <= baseline * threshold("0.5") {
                return Ok(Some(Resolution {
                    outcome: Outcome::PriceFailure,
                    max_multiplier,
                    time_to_outcome_ms: None,
                }));
            }
        }

        // 3. Liquidity collapse: peak and min measured in the SAME
        // failure window.
        if liquidity_collapsed(&fail_window) {
            return Ok(Some(Resolution {
                outcome: Outcome::LiquidityCollapse,
                max_multiplier,
                time_to_outcome_ms: None,
            }));
        }

        // 4. Volume collapse.
        if volume_collapsed(&trades, detected_ms, fail_deadline, now) {
            return Ok(Some(Resolution {
                outcome: Outcome::VolumeCollapse,
                max_multiplier,
                time_to_outcome_ms: None,
            }));
        }

        // 5. Early-wallet exit, only judged once the 2h mark has passed.
        if now >= detected_ms.plus_hours(EARLY_EXIT_CHECK_HOURS)
            && early_wallets_exited(&trades, detected_ms)
        {
            return Ok(Some(Resolution {
                outcome: Outcome::EarlyWalletExit,
                max_multiplier,
                time_to_outcome_ms: None,
            }));
        }

        // 6. Expiry.
        if !token.within_horizon(now, OUTCOME_WINDOW_HOURS) {
            return Ok(Some(Resolution {
                outcome: Outcome::Expired,
                max_multiplier,
                time_to_outcome_ms: None,
            }));
        }

        Ok(None)
    }
}

/// Min liquidity at or below 60% of peak liquidity, both inside the
/// failure window. A token that never showed liquidity cannot collapse.
fn liquidity_collapsed(fail_window: &[&&Trade]) -> bool {
    let liquidity: Vec<Decimal> = fail_window.iter().filter_map(|t| t.liquidity).collect();
    let peak = liquidity
        .iter()
        .copied()
        .fold(Decimal::zero(), |acc, l| acc.max(l));
    if !peak.is_positive() {
        return false;
    }
    let Some(min) = liquidity.iter().copied().min() else {
        return false;
    };
    min <= peak * threshold("0.6")
}

/// Three consecutive fully-elapsed hourly buckets with volume below 30%
/// of the trailing 6-hour average. Hours before `detected + 6h` are
/// skipped so an incomplete history cannot fake a collapse; an hour whose
/// trailing average AND own volume are both zero counts as collapsed
/// (a dead market is a collapsed market).
fn volume_collapsed(
    trades: &[Trade],
    detected_ms: TimeMs,
    fail_deadline: TimeMs,
    now: TimeMs,
) -> bool {
    let mut buckets: HashMap<i64, Decimal> = HashMap::new();
    for trade in trades {
        let hour = trade.time_ms.floor_hour().as_ms();
        let entry = buckets.entry(hour).or_insert_with(Decimal::zero);
        *entry = *entry + trade.notional();
    }

    let collapse_threshold = threshold("0.3");
    let six = Decimal::from_count(6);
    let first_evaluated = detected_ms.plus_hours(VOLUME_BUFFER_HOURS).floor_hour();
    let mut consecutive = 0u32;
    let mut curr = first_evaluated;

    // Only hours that have fully elapsed are judged.
    while curr.plus_hours(1) <= now && curr < fail_deadline {
        let vol_1h = buckets
            .get(&curr.as_ms())
            .copied()
            .unwrap_or_else(Decimal::zero);
        let sum_6h: Decimal = (1..=6)
            .filter_map(|i| buckets.get(&curr.minus_hours(i).as_ms()))
            .copied()
            .sum();
        let avg_6h = sum_6h / six;

        let collapsed = if avg_6h.is_positive() {
            vol_1h < avg_6h * collapse_threshold
        } else {
            vol_1h.is_zero()
        };

        if collapsed {
            consecutive += 1;
            if consecutive >= VOLUME_COLLAPSE_CONSECUTIVE {
                return true;
            }
        } else {
            consecutive = 0;
        }
        curr = curr.plus_hours(1);
    }
    false
}

/// At least 70% of the wallets that bought in the first 30 minutes after
/// detection hold a net position <= 0 by the 2-hour mark.
fn early_wallets_exited(trades: &[Trade], detected_ms: TimeMs) -> bool {
    let early_cutoff = detected_ms.plus_minutes(EARLY_WINDOW_MINUTES);
    let position_cutoff = detected_ms.plus_hours(EARLY_EXIT_CHECK_HOURS);

    let mut early_buyers: Vec<&Wallet> = Vec::new();
    for trade in trades {
        if trade.side == Side::Buy
            && trade.time_ms >= detected_ms
            && trade.time_ms <= early_cutoff
            && !early_buyers.contains(&&trade.wallet)
        {
            early_buyers.push(&trade.wallet);
        }
    }
    if early_buyers.is_empty() {
        return false;
    }

    let mut positions: HashMap<&Wallet, Decimal> = HashMap::new();
    for trade in trades.iter().filter(|t| t.time_ms <= position_cutoff) {
        let entry = positions.entry(&trade.wallet).or_insert_with(Decimal::zero);
        *entry = match trade.side {
            Side::Buy => *entry + trade.amount,
            Side::Sell => *entry - trade.amount,
        };
    }

    let exited = early_buyers
        .iter()
        .filter(|w| !positions.get(*w).map(|p| p.is_positive()).unwrap_or(false))
        .count();
    let ratio = Decimal::from_count(exited as i64)
        .ratio_to(Decimal::from_count(early_buyers.len() as i64));
    ratio >= threshold("0.7")
}
