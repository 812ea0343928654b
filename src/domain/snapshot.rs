//! Feature snapshot types: the frozen, versioned vector of windowed
//! statistics and the score record computed from it.

use crate::domain::{Decimal, Mint, TimeMs};
use serde::{Deserialize, Serialize};

/// Versioned configuration record for feature computation.
///
/// Read at computation time and stamped onto every snapshot it produces;
/// a schema or rule change ships with a new `version`, leaving prior
/// snapshots untouched and comparable only within their own version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub version: i32,
    /// Capability flag: whether windowed metrics are scoped to a single
    /// trading pair. Currently false; trades aggregate across pools for
    /// the same token (known data-model gap).
    pub pair_scoped: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            version: 1,
            pair_scoped: false,
        }
    }
}

/// The fixed feature vector, every window anchored at `detected_ms`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// 5m volume vs 30m hourly-rate average.
    pub volume_acceleration: Decimal,
    /// 1h volume growth vs trailing 6h hourly average.
    pub volume_growth_1h: Decimal,
    /// 5m trade count vs 30m rate average.
    pub trade_frequency_ratio: Decimal,
    /// Liquidity change over the last hour relative to its start.
    pub liquidity_growth_rate: Decimal,
    /// Relative stddev (stddev / mean) of observed liquidity over the
    /// last hour.
    pub liquidity_volatility: Decimal,
    /// Latest liquidity vs peak liquidity.
    pub liquidity_stability: Decimal,
    /// Unique wallets 1h vs trailing 6h hourly average.
    pub unique_wallet_growth: Decimal,
    /// Buy volume / sell volume over the last hour.
    pub buy_sell_ratio: Decimal,
    /// Share of tracked net balances held by the top 10 wallets.
    pub holder_concentration_top10: Decimal,
    /// Shannon entropy of positive net balances.
    pub wallet_entropy: Decimal,
    /// Fraction of early-window buyers still net-positive.
    pub early_wallet_retention: Decimal,
    /// Net position of early-window buyers as a fraction of their
    /// gross buys.
    pub early_wallet_accumulation: Decimal,
    /// Stddev of trade prices over the last hour.
    pub price_volatility_1h: Decimal,
    /// (peak - last) / peak over the last hour of prices.
    pub drawdown_depth_1h: Decimal,
    /// 1h volume vs trailing 6h hourly average (collapse indicator).
    pub volume_collapse_ratio: Decimal,
    /// Raw trade count in the last hour.
    pub trade_count_1h: Decimal,
}

/// Coarse market phase classified from raw feature thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    Ignition,
    Expansion,
    Unstable,
    Distribution,
    Fragile,
    Dormant,
}

impl MarketPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketPhase::Ignition => "ignition",
            MarketPhase::Expansion => "expansion",
            MarketPhase::Unstable => "unstable",
            MarketPhase::Distribution => "distribution",
            MarketPhase::Fragile => "fragile",
            MarketPhase::Dormant => "dormant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ignition" => Some(MarketPhase::Ignition),
            "expansion" => Some(MarketPhase::Expansion),
            "unstable" => Some(MarketPhase::Unstable),
            "distribution" => Some(MarketPhase::Distribution),
            "fragile" => Some(MarketPhase::Fragile),
            "dormant" => Some(MarketPhase::Dormant),
            _ => None,
        }
    }
}

/// Score band label derived from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLabel {
    SniperCandidate,
    HighAsymmetry,
    StructuredOpportunity,
    Transitional,
    LowProbability,
}

impl ScoreLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreLabel::SniperCandidate => "sniper_candidate",
            ScoreLabel::HighAsymmetry => "high_asymmetry",
            ScoreLabel::StructuredOpportunity => "structured_opportunity",
            ScoreLabel::Transitional => "transitional",
            ScoreLabel::LowProbability => "low_probability",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sniper_candidate" => Some(ScoreLabel::SniperCandidate),
            "high_asymmetry" => Some(ScoreLabel::HighAsymmetry),
            "structured_opportunity" => Some(ScoreLabel::StructuredOpportunity),
            "transitional" => Some(ScoreLabel::Transitional),
            "low_probability" => Some(ScoreLabel::LowProbability),
            _ => None,
        }
    }
}

/// Component scores attached 1:1 to a snapshot, computed before the
/// snapshot row is persisted and never recomputed afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub momentum: f64,
    pub liquidity: f64,
    pub participation: f64,
    pub wallet: f64,
    pub risk_penalty: f64,
    pub total: f64,
    pub label: ScoreLabel,
    pub phase: MarketPhase,
}

/// An immutable, versioned snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub id: i64,
    pub mint: Mint,
    pub feature_version: i32,
    pub pair_scoped: bool,
    pub snapshot_ms: TimeMs,
    pub features: FeatureVector,
    pub score: ScoreRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_phase_roundtrip() {
        for phase in [
            MarketPhase::Ignition,
            MarketPhase::Expansion,
            MarketPhase::Unstable,
            MarketPhase::Distribution,
            MarketPhase::Fragile,
            MarketPhase::Dormant,
        ] {
            assert_eq!(MarketPhase::parse(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn test_score_label_roundtrip() {
        for label in [
            ScoreLabel::SniperCandidate,
            ScoreLabel::HighAsymmetry,
            ScoreLabel::StructuredOpportunity,
            ScoreLabel::Transitional,
            ScoreLabel::LowProbability,
        ] {
            assert_eq!(ScoreLabel::parse(label.as_str()), Some(label));
        }
    }

    #[test]
    fn test_feature_config_default_not_pair_scoped() {
        let config = FeatureConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.pair_scoped);
    }
}
