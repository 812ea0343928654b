//! Lifecycle label: the single terminal outcome assigned to a snapshot.

use crate::domain::{Decimal, LifecycleStage, Mint, TimeMs};
use serde::{Deserialize, Serialize};

/// Closed outcome set, in resolution priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Price reached the success multiple of baseline within the window.
    Success,
    /// Price fell below the failure fraction of baseline.
    PriceFailure,
    /// Liquidity fell below the collapse fraction of its windowed peak.
    LiquidityCollapse,
    /// Volume dropped below the collapse fraction of its trailing average.
    VolumeCollapse,
    /// Most early-window buyers net-exited.
    EarlyWalletExit,
    /// Horizon elapsed with none of the above.
    Expired,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::PriceFailure => "price_failure",
            Outcome::LiquidityCollapse => "liquidity_collapse",
            Outcome::VolumeCollapse => "volume_collapse",
            Outcome::EarlyWalletExit => "early_wallet_exit",
            Outcome::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Outcome::Success),
            "price_failure" => Some(Outcome::PriceFailure),
            "liquidity_collapse" => Some(Outcome::LiquidityCollapse),
            "volume_collapse" => Some(Outcome::VolumeCollapse),
            "early_wallet_exit" => Some(Outcome::EarlyWalletExit),
            "expired" => Some(Outcome::Expired),
            _ => None,
        }
    }

    /// The terminal token stage this outcome maps to.
    pub fn terminal_stage(&self) -> LifecycleStage {
        match self {
            Outcome::Success => LifecycleStage::Success,
            Outcome::Expired => LifecycleStage::Expired,
            Outcome::PriceFailure
            | Outcome::LiquidityCollapse
            | Outcome::VolumeCollapse
            | Outcome::EarlyWalletExit => LifecycleStage::Failed,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exactly one per feature snapshot, enforced by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleLabel {
    pub snapshot_id: i64,
    pub mint: Mint,
    pub outcome: Outcome,
    /// Peak price multiple of baseline observed within the window.
    pub max_multiplier: Decimal,
    /// Time from detection to the outcome event, when one exists
    /// (success hits record the hit instant; failures do not).
    pub time_to_outcome_ms: Option<i64>,
    pub labeled_ms: TimeMs,
}
