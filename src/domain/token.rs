//! Token identity and lifecycle stage.

use crate::domain::{Decimal, Mint, TimeMs};
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a watched token.
///
/// Monotonic forward except the explicit sustain-reset back to
/// `PreEligible`. Terminal stages are written only by the label worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    PreEligible,
    EligiblePendingSustain,
    ActiveMonitoring,
    Success,
    Failed,
    Expired,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::PreEligible => "pre_eligible",
            LifecycleStage::EligiblePendingSustain => "eligible_pending_sustain",
            LifecycleStage::ActiveMonitoring => "active_monitoring",
            LifecycleStage::Success => "success",
            LifecycleStage::Failed => "failed",
            LifecycleStage::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pre_eligible" => Some(LifecycleStage::PreEligible),
            "eligible_pending_sustain" => Some(LifecycleStage::EligiblePendingSustain),
            "active_monitoring" => Some(LifecycleStage::ActiveMonitoring),
            "success" => Some(LifecycleStage::Success),
            "failed" => Some(LifecycleStage::Failed),
            "expired" => Some(LifecycleStage::Expired),
            _ => None,
        }
    }

    /// Terminal stages never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleStage::Success | LifecycleStage::Failed | LifecycleStage::Expired
        )
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A watch-listed token and its gate bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub mint: Mint,
    pub stage: LifecycleStage,
    /// Timestamp of the first trade ever seen for this token.
    pub first_trade_ms: Option<TimeMs>,
    /// When liquidity first crossed the eligibility threshold; cleared if
    /// the sustain window is broken.
    pub liquidity_crossed_ms: Option<TimeMs>,
    /// Frozen the instant the sustain condition was satisfied. Set exactly
    /// once; the reference clock for every downstream window.
    pub detected_ms: Option<TimeMs>,
    /// Highest liquidity observed across all trades.
    pub peak_liquidity: Decimal,
    /// First positive trade price at or after `detected_ms`.
    pub baseline_price: Option<Decimal>,
    /// When the label worker resolved a terminal outcome.
    pub resolved_ms: Option<TimeMs>,
}

impl Token {
    /// A freshly sighted token, before any gate evaluation.
    pub fn pre_eligible(mint: Mint, first_trade_ms: TimeMs) -> Self {
        Token {
            mint,
            stage: LifecycleStage::PreEligible,
            first_trade_ms: Some(first_trade_ms),
            liquidity_crossed_ms: None,
            detected_ms: None,
            peak_liquidity: Decimal::zero(),
            baseline_price: None,
            resolved_ms: None,
        }
    }

    /// Whether the observation horizon (from `detected_ms`) is still open.
    pub fn within_horizon(&self, now: TimeMs, horizon_hours: i64) -> bool {
        match self.detected_ms {
            Some(detected) => now < detected.plus_hours(horizon_hours),
            None => false,
        }
    }
}
