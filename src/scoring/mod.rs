//! Scoring engine: pure functions from a feature vector to a score record.
//!
//! No I/O and no clock in here. Each feature is normalized into [0, 1]
//! by capped linear scaling over a fixed band, weighted, and summed into
//! component scores. 85 positive points and 15 penalty points give a
//! theoretical [0, 100] range, clamped after combination.
//!
//! Bands and weights are tunable constants; recalibrate them from the
//! label set once it is large enough.

use crate::domain::{FeatureVector, MarketPhase, ScoreLabel, ScoreRecord};

// Normalization bands: (min, max) for capped linear scaling.
const BAND_VOLUME_ACCELERATION: (f64, f64) = (1.0, 3.0);
const BAND_VOLUME_GROWTH_1H: (f64, f64) = (0.0, 2.0);
const BAND_TRADE_FREQUENCY_RATIO: (f64, f64) = (1.0, 3.0);
const BAND_LIQUIDITY_GROWTH_RATE: (f64, f64) = (0.0, 0.5);
const BAND_LIQUIDITY_STABILITY: (f64, f64) = (0.4, 1.0);
const BAND_UNIQUE_WALLET_GROWTH: (f64, f64) = (0.0, 1.0);
const BAND_BUY_SELL_RATIO: (f64, f64) = (1.0, 3.0);
const BAND_WALLET_ENTROPY: (f64, f64) = (1.0, 3.0);
const BAND_EARLY_WALLET_RETENTION: (f64, f64) = (0.3, 0.9);
const BAND_EARLY_WALLET_ACCUMULATION: (f64, f64) = (0.0, 0.3);
const BAND_HOLDER_CONCENTRATION: (f64, f64) = (0.2, 0.8);
const BAND_DRAWDOWN_DEPTH_1H: (f64, f64) = (0.0, 0.5);
const BAND_VOLUME_COLLAPSE_RATIO: (f64, f64) = (0.0, 1.0);
const BAND_LIQUIDITY_VOLATILITY: (f64, f64) = (0.0, 0.5);

// Weights: momentum 25 + liquidity 20 + participation 20 + wallet 20 = 85
// positive, risk penalty 15.
const W_VOLUME_ACCELERATION: f64 = 10.0;
const W_VOLUME_GROWTH_1H: f64 = 10.0;
const W_TRADE_FREQUENCY_RATIO: f64 = 5.0;
const W_LIQUIDITY_GROWTH_RATE: f64 = 12.0;
const W_LIQUIDITY_STABILITY: f64 = 8.0;
const W_UNIQUE_WALLET_GROWTH: f64 = 10.0;
const W_BUY_SELL_RATIO: f64 = 5.0;
const W_WALLET_ENTROPY: f64 = 5.0;
const W_EARLY_WALLET_RETENTION: f64 = 10.0;
const W_EARLY_WALLET_ACCUMULATION: f64 = 6.0;
const W_HOLDER_CONCENTRATION: f64 = 4.0;
const W_DRAWDOWN_DEPTH_1H: f64 = 6.0;
const W_VOLUME_COLLAPSE_RATIO: f64 = 5.0;
const W_LIQUIDITY_VOLATILITY: f64 = 4.0;

/// Linearly scale `value` into [0, 1] over `band`, clamped. With
/// `invert`, high raw values map low (for features where higher is worse).
fn normalize(value: f64, band: (f64, f64), invert: bool) -> f64 {
    let (min, max) = band;
    if max == min {
        return 0.0;
    }
    let scaled = ((value - min) / (max - min)).clamp(0.0, 1.0);
    if invert {
        1.0 - scaled
    } else {
        scaled
    }
}

fn points(value: f64, band: (f64, f64), weight: f64) -> f64 {
    normalize(value, band, false) * weight
}

fn points_inverted(value: f64, band: (f64, f64), weight: f64) -> f64 {
    normalize(value, band, true) * weight
}

/// Momentum component, 25 points max.
pub fn score_momentum(f: &FeatureVector) -> f64 {
    points(
        f.volume_acceleration.to_f64_lossy(),
        BAND_VOLUME_ACCELERATION,
        W_VOLUME_ACCELERATION,
    ) + points(
        f.volume_growth_1h.to_f64_lossy(),
        BAND_VOLUME_GROWTH_1H,
        W_VOLUME_GROWTH_1H,
    ) + points(
        f.trade_frequency_ratio.to_f64_lossy(),
        BAND_TRADE_FREQUENCY_RATIO,
        W_TRADE_FREQUENCY_RATIO,
    )
}

/// Liquidity component, 20 points max.
pub fn score_liquidity(f: &FeatureVector) -> f64 {
    points(
        f.liquidity_growth_rate.to_f64_lossy(),
        BAND_LIQUIDITY_GROWTH_RATE,
        W_LIQUIDITY_GROWTH_RATE,
    ) + points(
        f.liquidity_stability.to_f64_lossy(),
        BAND_LIQUIDITY_STABILITY,
        W_LIQUIDITY_STABILITY,
    )
}

/// Participation component, 20 points max.
pub fn score_participation(f: &FeatureVector) -> f64 {
    points(
        f.unique_wallet_growth.to_f64_lossy(),
        BAND_UNIQUE_WALLET_GROWTH,
        W_UNIQUE_WALLET_GROWTH,
    ) + points(
        f.buy_sell_ratio.to_f64_lossy(),
        BAND_BUY_SELL_RATIO,
        W_BUY_SELL_RATIO,
    ) + points(
        f.wallet_entropy.to_f64_lossy(),
        BAND_WALLET_ENTROPY,
        W_WALLET_ENTROPY,
    )
}

/// Wallet-conviction component, 20 points max. Concentration is
/// inverted: a top-heavy holder base scores low.
pub fn score_wallet(f: &FeatureVector) -> f64 {
    points(
        f.early_wallet_retention.to_f64_lossy(),
        BAND_EARLY_WALLET_RETENTION,
        W_EARLY_WALLET_RETENTION,
    ) + points(
        f.early_wallet_accumulation.to_f64_lossy(),
        BAND_EARLY_WALLET_ACCUMULATION,
        W_EARLY_WALLET_ACCUMULATION,
    ) + points_inverted(
        f.holder_concentration_top10.to_f64_lossy(),
        BAND_HOLDER_CONCENTRATION,
        W_HOLDER_CONCENTRATION,
    )
}

/// Risk penalty, 15 points max. Collapse ratio is inverted: LOW volume
/// relative to trailing average is what earns penalty points.
pub fn score_risk(f: &FeatureVector) -> f64 {
    points(
        f.drawdown_depth_1h.to_f64_lossy(),
        BAND_DRAWDOWN_DEPTH_1H,
        W_DRAWDOWN_DEPTH_1H,
    ) + points_inverted(
        f.volume_collapse_ratio.to_f64_lossy(),
        BAND_VOLUME_COLLAPSE_RATIO,
        W_VOLUME_COLLAPSE_RATIO,
    ) + points(
        f.liquidity_volatility.to_f64_lossy(),
        BAND_LIQUIDITY_VOLATILITY,
        W_LIQUIDITY_VOLATILITY,
    )
}

/// Label bands over the final total.
pub fn score_label(total: f64) -> ScoreLabel {
    if total >= 85.0 {
        ScoreLabel::SniperCandidate
    } else if total >= 75.0 {
        ScoreLabel::HighAsymmetry
    } else if total >= 60.0 {
        ScoreLabel::StructuredOpportunity
    } else if total >= 30.0 {
        ScoreLabel::Transitional
    } else {
        ScoreLabel::LowProbability
    }
}

/// Coarse market phase from raw feature thresholds, checked in severity
/// order so a collapsing market never reads as expanding.
pub fn classify_phase(f: &FeatureVector) -> MarketPhase {
    let vol_collapse = f.volume_collapse_ratio.to_f64_lossy();
    let buy_sell = f.buy_sell_ratio.to_f64_lossy();
    let concentration = f.holder_concentration_top10.to_f64_lossy();
    let drawdown = f.drawdown_depth_1h.to_f64_lossy();
    let liq_volatility = f.liquidity_volatility.to_f64_lossy();
    let vol_accel = f.volume_acceleration.to_f64_lossy();
    let liq_growth = f.liquidity_growth_rate.to_f64_lossy();
    let vol_growth = f.volume_growth_1h.to_f64_lossy();
    let trade_count = f.trade_count_1h.to_f64_lossy();

    if trade_count == 0.0 {
        MarketPhase::Dormant
    } else if vol_collapse < 0.4 {
        MarketPhase::Fragile
    } else if buy_sell < 0.8 && concentration > 0.5 {
        MarketPhase::Distribution
    } else if drawdown > 0.3 || liq_volatility > 0.4 {
        MarketPhase::Unstable
    } else if vol_accel > 1.5 && liq_growth >= 0.0 {
        MarketPhase::Ignition
    } else if vol_growth > 0.5 && buy_sell > 1.1 {
        MarketPhase::Expansion
    } else {
        MarketPhase::Dormant
    }
}

/// Full score computation: components, clamped total, label, phase.
pub fn compute_score(features: &FeatureVector) -> ScoreRecord {
    let momentum = score_momentum(features);
    let liquidity = score_liquidity(features);
    let participation = score_participation(features);
    let wallet = score_wallet(features);
    let risk_penalty = score_risk(features);

    // The probabilistic-model blend stays out until the label set is
    // large enough to train on; the rule score passes through unmodified,
    // never scaled by the model's nominal weight.
    let rule_total = momentum + liquidity + participation + wallet - risk_penalty;
    let total = rule_total.clamp(0.0, 100.0);

    ScoreRecord {
        momentum,
        liquidity,
        participation,
        wallet,
        risk_penalty,
        total,
        label: score_label(total),
        phase: classify_phase(features),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn strong_features() -> FeatureVector {
        FeatureVector {
            volume_acceleration: dec("3"),
            volume_growth_1h: dec("2"),
            trade_frequency_ratio: dec("3"),
            liquidity_growth_rate: dec("0.5"),
            liquidity_volatility: dec("0"),
            liquidity_stability: dec("1"),
            unique_wallet_growth: dec("1"),
            buy_sell_ratio: dec("3"),
            holder_concentration_top10: dec("0.2"),
            wallet_entropy: dec("3"),
            early_wallet_retention: dec("0.9"),
            early_wallet_accumulation: dec("0.3"),
            price_volatility_1h: dec("0"),
            drawdown_depth_1h: dec("0"),
            volume_collapse_ratio: dec("1"),
            trade_count_1h: dec("100"),
        }
    }

    #[test]
    fn test_normalize_clamps_and_inverts() {
        assert_eq!(normalize(2.0, (1.0, 3.0), false), 0.5);
        assert_eq!(normalize(0.0, (1.0, 3.0), false), 0.0);
        assert_eq!(normalize(9.0, (1.0, 3.0), false), 1.0);
        assert_eq!(normalize(1.0, (1.0, 3.0), true), 1.0);
        assert_eq!(normalize(5.0, (0.0, 0.0), false), 0.0, "degenerate band");
    }

    #[test]
    fn test_perfect_features_hit_85() {
        let score = compute_score(&strong_features());
        assert!((score.momentum - 25.0).abs() < 1e-9);
        assert!((score.liquidity - 20.0).abs() < 1e-9);
        assert!((score.participation - 20.0).abs() < 1e-9);
        assert!((score.wallet - 20.0).abs() < 1e-9);
        assert!(score.risk_penalty.abs() < 1e-9);
        assert!((score.total - 85.0).abs() < 1e-9);
        assert_eq!(score.label, ScoreLabel::SniperCandidate);
    }

    #[test]
    fn test_zero_features_floor_at_zero() {
        let score = compute_score(&FeatureVector::default());
        // Risk penalty exceeds positives (collapse ratio 0 inverts to max
        // penalty), but the total never goes negative.
        assert_eq!(score.total, 0.0);
        assert_eq!(score.label, ScoreLabel::LowProbability);
    }

    #[test]
    fn test_total_equals_rule_score_unmodified() {
        let f = strong_features();
        let score = compute_score(&f);
        let rule = score_momentum(&f) + score_liquidity(&f) + score_participation(&f)
            + score_wallet(&f)
            - score_risk(&f);
        assert_eq!(score.total, rule.clamp(0.0, 100.0));
    }

    #[test]
    fn test_risk_penalty_lowers_total() {
        let mut f = strong_features();
        f.drawdown_depth_1h = dec("0.5");
        f.liquidity_volatility = dec("0.5");
        let score = compute_score(&f);
        assert!((score.risk_penalty - 10.0).abs() < 1e-9);
        assert!((score.total - 75.0).abs() < 1e-9);
        assert_eq!(score.label, ScoreLabel::HighAsymmetry);
    }

    #[test]
    fn test_concentration_inverted() {
        let mut f = strong_features();
        let spread = compute_score(&f).wallet;
        f.holder_concentration_top10 = dec("0.8");
        let concentrated = compute_score(&f).wallet;
        assert!(concentrated < spread);
    }

    #[test]
    fn test_label_bands() {
        assert_eq!(score_label(85.0), ScoreLabel::SniperCandidate);
        assert_eq!(score_label(80.0), ScoreLabel::HighAsymmetry);
        assert_eq!(score_label(60.0), ScoreLabel::StructuredOpportunity);
        assert_eq!(score_label(59.9), ScoreLabel::Transitional);
        assert_eq!(score_label(29.9), ScoreLabel::LowProbability);
    }

    #[test]
    fn test_phase_fragile_beats_expansion() {
        let mut f = strong_features();
        f.volume_collapse_ratio = dec("0.3");
        assert_eq!(classify_phase(&f), MarketPhase::Fragile);
    }

    #[test]
    fn test_phase_dormant_without_trades() {
        let f = FeatureVector::default();
        assert_eq!(classify_phase(&f), MarketPhase::Dormant);
    }

    #[test]
    fn test_phase_ignition() {
        let mut f = strong_features();
        f.volume_acceleration = dec("2");
        f.drawdown_depth_1h = dec("0");
        assert_eq!(classify_phase(&f), MarketPhase::Ignition);
    }

    #[test]
    fn test_phase_distribution() {
        let mut f = strong_features();
        f.buy_sell_ratio = dec("0.5");
        f.holder_concentration_top10 = dec("0.7");
        assert_eq!(classify_phase(&f), MarketPhase::Distribution);
    }

    #[test]
    fn test_deterministic() {
        let f = strong_features();
        assert_eq!(compute_score(&f), compute_score(&f));
    }
}
