//! Pure feature computation over an in-memory trade slice.
//!
//! Every window looks backward from the detection instant, never from the
//! wall clock, so recomputing with the same trades yields bit-identical
//! values. Float math only enters for stddev and entropy, and those pass
//! through `Decimal::from_f64_lossy` exactly once.

use crate::domain::{Decimal, FeatureVector, Side, TimeMs, Trade, Wallet};
use std::collections::HashMap;

const EARLY_WINDOW_MINUTES: i64 = 30;

/// Compute the 16-feature vector from all trades with
/// `time_ms <= detected_ms`, anchored at `detected_ms`.
///
/// `first_trade_ms` anchors the early-wallet window; `peak_liquidity` is
/// the token's running peak from ingestion.
pub fn compute_features(
    trades: &[Trade],
    detected_ms: TimeMs,
    first_trade_ms: Option<TimeMs>,
    peak_liquidity: Decimal,
) -> FeatureVector {
    let in_window = |t: &&Trade, minutes: i64| {
        t.time_ms > detected_ms.minus_minutes(minutes) && t.time_ms <= detected_ms
    };
    let trades_5m: Vec<&Trade> = trades.iter().filter(|t| in_window(t, 5)).collect();
    let trades_30m: Vec<&Trade> = trades.iter().filter(|t| in_window(t, 30)).collect();
    let trades_1h: Vec<&Trade> = trades.iter().filter(|t| in_window(t, 60)).collect();
    let trades_6h: Vec<&Trade> = trades.iter().filter(|t| in_window(t, 360)).collect();

    let six = Decimal::from_count(6);

    // Volume momentum: short window vs longer-window hourly rate.
    let v_5m = notional_sum(&trades_5m);
    let v_30m = notional_sum(&trades_30m);
    let v_1h = notional_sum(&trades_1h);
    let v_6h = notional_sum(&trades_6h);
    let v_30m_rate = v_30m / six;
    let v_6h_avg = v_6h / six;

    let volume_acceleration = v_5m.ratio_to(v_30m_rate);
    let volume_growth_1h = (v_1h - v_6h_avg).ratio_to(v_6h_avg);
    let volume_collapse_ratio = v_1h.ratio_to(v_6h_avg);

    let t_5m = Decimal::from_count(trades_5m.len() as i64);
    let t_30m_rate = Decimal::from_count(trades_30m.len() as i64) / six;
    let trade_frequency_ratio = t_5m.ratio_to(t_30m_rate);

    // Liquidity series over the last hour, in trade order.
    let liq_1h: Vec<Decimal> = trades_1h.iter().filter_map(|t| t.liquidity).collect();
    let liquidity_growth_rate = match (liq_1h.first(), liq_1h.last()) {
        (Some(&first), Some(&last)) => (last - first).ratio_to(first),
        _ => Decimal::zero(),
    };
    let liquidity_volatility = relative_stddev(&liq_1h);
    let latest_liquidity = trades
        .iter()
        .rev()
        .find_map(|t| t.liquidity)
        .unwrap_or_else(Decimal::zero);
    let liquidity_stability = if peak_liquidity.is_positive() {
        latest_liquidity.ratio_to(peak_liquidity)
    } else {
        Decimal::zero()
    };

    // Participation.
    let uw_1h = Decimal::from_count(unique_wallets(&trades_1h));
    let uw_6h_avg = Decimal::from_count(unique_wallets(&trades_6h)) / six;
    let unique_wallet_growth = (uw_1h - uw_6h_avg).ratio_to(uw_6h_avg);

    let buy_vol_1h = side_volume(&trades_1h, Side::Buy);
    let sell_vol_1h = side_volume(&trades_1h, Side::Sell);
    let buy_sell_ratio = buy_vol_1h.ratio_to(sell_vol_1h);

    // Net balances across the full history up to the anchor.
    let balances = net_balances(trades);
    let holder_concentration_top10 = top10_concentration(&balances);
    let wallet_entropy = balance_entropy(&balances);

    let (early_wallet_retention, early_wallet_accumulation) =
        early_wallet_stats(trades, &balances, first_trade_ms);

    // Price risk over the last hour.
    let prices_1h: Vec<Decimal> = trades_1h
        .iter()
        .filter(|t| t.price.is_positive())
        .map(|t| t.price)
        .collect();
    let price_volatility_1h = stddev(&prices_1h);
    let drawdown_depth_1h = drawdown(&prices_1h);

    FeatureVector {
        volume_acceleration,
        volume_growth_1h,
        trade_frequency_ratio,
        liquidity_growth_rate,
        liquidity_volatility,
        liquidity_stability,
        unique_wallet_growth,
        buy_sell_ratio,
        holder_concentration_top10,
        wallet_entropy,
        early_wallet_retention,
        early_wallet_accumulation,
        price_volatility_1h,
        drawdown_depth_1h,
        volume_collapse_ratio,
        trade_count_1h: Decimal::from_count(trades_1h.len() as i64),
    }
}

fn notional_sum(trades: &[&Trade]) -> Decimal {
    trades.iter().map(|t| t.notional()).sum()
}

fn side_volume(trades: &[&Trade], side: Side) -> Decimal {
    trades
        .iter()
        .filter(|t| t.side == side)
        .map(|t| t.notional())
        .sum()
}

fn unique_wallets(trades: &[&Trade]) -> i64 {
    let mut wallets: Vec<&str> = trades.iter().map(|t| t.wallet.as_str()).collect();
    wallets.sort_unstable();
    wallets.dedup();
    wallets.len() as i64
}

/// Signed token balance per wallet: +amount on buy, -amount on sell.
fn net_balances(trades: &[Trade]) -> HashMap<Wallet, Decimal> {
    let mut balances: HashMap<Wallet, Decimal> = HashMap::new();
    for trade in trades {
        let entry = balances
            .entry(trade.wallet.clone())
            .or_insert_with(Decimal::zero);
        *entry = match trade.side {
            Side::Buy => *entry + trade.amount,
            Side::Sell => *entry - trade.amount,
        };
    }
    balances
}

/// Share of all positive balances held by the 10 largest holders.
fn top10_concentration(balances: &HashMap<Wallet, Decimal>) -> Decimal {
    let mut positive: Vec<Decimal> = balances.values().copied().filter(|b| b.is_positive()).collect();
    if positive.is_empty() {
        return Decimal::zero();
    }
    positive.sort_unstable_by(|a, b| b.cmp(a));
    let total: Decimal = positive.iter().copied().sum();
    let top10: Decimal = positive.iter().take(10).copied().sum();
    top10.ratio_to(total)
}

/// Shannon entropy (natural log) of the positive-balance distribution.
fn balance_entropy(balances: &HashMap<Wallet, Decimal>) -> Decimal {
    let positive: Vec<f64> = balances
        .values()
        .filter(|b| b.is_positive())
        .map(|b| b.to_f64_lossy())
        .collect();
    let total: f64 = positive.iter().sum();
    if total <= 0.0 {
        return Decimal::zero();
    }
    let entropy = -positive
        .iter()
        .map(|b| b / total)
        .filter(|p| *p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>();
    Decimal::from_f64_lossy(entropy)
}

/// Retention and accumulation of wallets that bought within the first
/// 30 minutes of the token's life.
fn early_wallet_stats(
    trades: &[Trade],
    balances: &HashMap<Wallet, Decimal>,
    first_trade_ms: Option<TimeMs>,
) -> (Decimal, Decimal) {
    let Some(first) = first_trade_ms else {
        return (Decimal::zero(), Decimal::zero());
    };
    let cutoff = first.plus_minutes(EARLY_WINDOW_MINUTES);

    let mut early_buyers: Vec<&Wallet> = Vec::new();
    let mut gross_buys = Decimal::zero();
    for trade in trades {
        if trade.side == Side::Buy && trade.time_ms < cutoff {
            if !early_buyers.contains(&&trade.wallet) {
                early_buyers.push(&trade.wallet);
            }
            gross_buys = gross_buys + trade.amount;
        }
    }
    if early_buyers.is_empty() {
        return (Decimal::zero(), Decimal::zero());
    }

    let still_holding = early_buyers
        .iter()
        .filter(|w| balances.get(**w).map(|b| b.is_positive()).unwrap_or(false))
        .count();
    let retention = Decimal::from_count(still_holding as i64)
        .ratio_to(Decimal::from_count(early_buyers.len() as i64));

    let net_total: Decimal = early_buyers
        .iter()
        .filter_map(|w| balances.get(*w))
        .copied()
        .sum();
    let accumulation = net_total.ratio_to(gross_buys);

    (retention, accumulation)
}

/// Population standard deviation via f64.
fn stddev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::zero();
    }
    let floats: Vec<f64> = values.iter().map(|v| v.to_f64_lossy()).collect();
    let mean = floats.iter().sum::<f64>() / floats.len() as f64;
    let variance = floats.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / floats.len() as f64;
    Decimal::from_f64_lossy(variance.sqrt())
}

/// Stddev scaled by the mean, so the band is unit-free.
fn relative_stddev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::zero();
    }
    let floats: Vec<f64> = values.iter().map(|v| v.to_f64_lossy()).collect();
    let mean = floats.iter().sum::<f64>() / floats.len() as f64;
    if mean <= 0.0 {
        return Decimal::zero();
    }
    let variance = floats.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / floats.len() as f64;
    Decimal::from_f64_lossy(variance.sqrt() / mean)
}

/// (peak - last) / peak over a price series.
fn drawdown(prices: &[Decimal]) -> Decimal {
    let Some(&last) = prices.last() else {
        return Decimal::zero();
    };
    let peak = prices
        .iter()
        .copied()
        .fold(Decimal::zero(), |acc, p| acc.max(p));
    if !peak.is_positive() {
        return Decimal::zero();
    }
    (peak - last).ratio_to(peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mint, Signature};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn trade(
        sig: &str,
        wallet: &str,
        side: Side,
        amount: &str,
        price: &str,
        liquidity: Option<&str>,
        time_ms: i64,
    ) -> Trade {
        Trade::new(
            Mint::new("MINT_A"),
            crate::domain::Wallet::new(wallet),
            side,
            dec(amount),
            dec(price),
            liquidity.map(dec),
            Signature::new(sig),
            1,
            TimeMs::new(time_ms),
        )
    }

    #[test]
    fn test_empty_trades_yield_zeroed_momentum() {
        let f = compute_features(&[], TimeMs::new(3_600_000), None, Decimal::zero());
        assert!(f.volume_acceleration.is_zero());
        assert!(f.trade_count_1h.is_zero());
        assert!(f.wallet_entropy.is_zero());
    }

    #[test]
    fn test_trade_count_and_window_bounds() {
        let anchor = TimeMs::new(10 * 3_600_000);
        let trades = vec![
            // Inside 1h window.
            trade("s1", "W1", Side::Buy, "10", "1", None, anchor.minus_minutes(30).as_ms()),
            // Exactly at the anchor: included.
            trade("s2", "W2", Side::Buy, "10", "1", None, anchor.as_ms()),
            // Outside 1h, inside 6h.
            trade("s3", "W3", Side::Buy, "10", "1", None, anchor.minus_hours(2).as_ms()),
            // After the anchor: never counted.
            trade("s4", "W4", Side::Buy, "10", "1", None, anchor.plus_minutes(1).as_ms()),
        ];
        let f = compute_features(&trades, anchor, None, Decimal::zero());
        assert_eq!(f.trade_count_1h, dec("2"));
    }

    #[test]
    fn test_buy_sell_ratio() {
        let anchor = TimeMs::new(10 * 3_600_000);
        let trades = vec![
            trade("s1", "W1", Side::Buy, "30", "1", None, anchor.minus_minutes(10).as_ms()),
            trade("s2", "W2", Side::Sell, "10", "1", None, anchor.minus_minutes(9).as_ms()),
        ];
        let f = compute_features(&trades, anchor, None, Decimal::zero());
        assert_eq!(f.buy_sell_ratio, dec("3"));
    }

    #[test]
    fn test_liquidity_stability_latest_over_peak() {
        let anchor = TimeMs::new(10 * 3_600_000);
        let trades = vec![
            trade("s1", "W1", Side::Buy, "1", "1", Some("80000"), anchor.minus_minutes(20).as_ms()),
            trade("s2", "W1", Side::Buy, "1", "1", Some("60000"), anchor.minus_minutes(5).as_ms()),
        ];
        let f = compute_features(&trades, anchor, None, dec("80000"));
        assert_eq!(f.liquidity_stability, dec("0.75"));
    }

    #[test]
    fn test_concentration_single_holder_is_total() {
        let anchor = TimeMs::new(10 * 3_600_000);
        let trades = vec![trade(
            "s1", "W1", Side::Buy, "100", "1", None, anchor.minus_minutes(5).as_ms(),
        )];
        let f = compute_features(&trades, anchor, None, Decimal::zero());
        assert_eq!(f.holder_concentration_top10, dec("1"));
        assert!(f.wallet_entropy.is_zero(), "one holder has zero entropy");
    }

    #[test]
    fn test_early_wallet_retention_and_accumulation() {
        let first = TimeMs::new(0);
        let anchor = TimeMs::new(2 * 3_600_000);
        let trades = vec![
            // Two early buyers.
            trade("s1", "W1", Side::Buy, "100", "1", None, 60_000),
            trade("s2", "W2", Side::Buy, "100", "1", None, 120_000),
            // W2 fully exits later.
            trade("s3", "W2", Side::Sell, "100", "1", None, 3_600_000),
            // Late buyer, not early.
            trade("s4", "W3", Side::Buy, "50", "1", None, 3_600_000),
        ];
        let f = compute_features(&trades, anchor, Some(first), Decimal::zero());
        assert_eq!(f.early_wallet_retention, dec("0.5"));
        // Net 100 of 200 gross early buys.
        assert_eq!(f.early_wallet_accumulation, dec("0.5"));
    }

    #[test]
    fn test_drawdown() {
        let anchor = TimeMs::new(10 * 3_600_000);
        let trades = vec![
            trade("s1", "W1", Side::Buy, "1", "2", None, anchor.minus_minutes(30).as_ms()),
            trade("s2", "W1", Side::Buy, "1", "4", None, anchor.minus_minutes(20).as_ms()),
            trade("s3", "W1", Side::Buy, "1", "3", None, anchor.minus_minutes(10).as_ms()),
        ];
        let f = compute_features(&trades, anchor, None, Decimal::zero());
        assert_eq!(f.drawdown_depth_1h, dec("0.25"));
    }

    #[test]
    fn test_volume_collapse_ratio_steady_market() {
        let anchor = TimeMs::new(10 * 3_600_000);
        // One 10-notional trade per hour for 6 hours: 1h volume equals the
        // trailing hourly average.
        let trades: Vec<Trade> = (0..6)
            .map(|i| {
                trade(
                    &format!("s{}", i),
                    "W1",
                    Side::Buy,
                    "10",
                    "1",
                    None,
                    anchor.minus_hours(i).minus_minutes(30).as_ms(),
                )
            })
            .collect();
        let f = compute_features(&trades, anchor, None, Decimal::zero());
        assert_eq!(f.volume_collapse_ratio, dec("1"));
    }

    #[test]
    fn test_recompute_bit_identical() {
        let anchor = TimeMs::new(10 * 3_600_000);
        let trades = vec![
            trade("s1", "W1", Side::Buy, "33.7", "0.013", Some("51234.5"), anchor.minus_minutes(40).as_ms()),
            trade("s2", "W2", Side::Sell, "12.1", "0.011", Some("50990.1"), anchor.minus_minutes(12).as_ms()),
            trade("s3", "W3", Side::Buy, "7.77", "0.014", Some("52000"), anchor.minus_minutes(3).as_ms()),
        ];
        let a = compute_features(&trades, anchor, Some(TimeMs::new(0)), dec("52000"));
        let b = compute_features(&trades, anchor, Some(TimeMs::new(0)), dec("52000"));
        assert_eq!(a, b);
        // Canonical strings identical too, not just numeric equality.
        assert_eq!(
            a.wallet_entropy.to_canonical_string(),
            b.wallet_entropy.to_canonical_string()
        );
    }
}
