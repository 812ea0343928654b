//! Pre-promotion filter chain.
//!
//! Ordered predicate/reason pairs; evaluation returns the FIRST failing
//! reason so operators see one stable, attributable cause per token per
//! pass rather than a bag of booleans.

use crate::domain::{Decimal, TimeMs, Token, Trade};

pub const MIN_TRADE_COUNT: usize = 20;
pub const MIN_LIQUIDITY_USD: i64 = 50_000;
pub const MIN_VOLUME_FIRST_30M_USD: i64 = 5_000;
pub const TRADE_GAP_LIMIT_MINUTES: i64 = 10;
const EARLY_WINDOW_MINUTES: i64 = 30;

pub struct FilterContext<'a> {
    pub token: &'a Token,
    /// All trades for the token with `time_ms <= now`, time-ordered.
    pub trades: &'a [Trade],
}

type Predicate = fn(&FilterContext) -> bool;

/// The chain, in evaluation order.
pub const FILTERS: &[(&str, Predicate)] = &[
    ("min_trade_count", min_trade_count),
    ("peak_liquidity", peak_liquidity),
    ("early_volume", early_volume),
    ("trade_gap", trade_gap),
];

/// First failing filter name, or `None` when the token passes the chain.
pub fn first_failure(ctx: &FilterContext) -> Option<&'static str> {
    FILTERS
        .iter()
        .find(|(_, check)| !check(ctx))
        .map(|(name, _)| *name)
}

fn min_trade_count(ctx: &FilterContext) -> bool {
    ctx.trades.len() >= MIN_TRADE_COUNT
}

fn peak_liquidity(ctx: &FilterContext) -> bool {
    let observed = ctx
        .trades
        .iter()
        .filter_map(|t| t.liquidity)
        .fold(Decimal::zero(), |acc, l| acc.max(l));
    let peak = ctx.token.peak_liquidity.max(observed);
    peak >= Decimal::from_count(MIN_LIQUIDITY_USD)
}

/// Notional volume over the token's first 30 minutes of life.
fn early_volume(ctx: &FilterContext) -> bool {
    let trades = early_window(ctx);
    let volume: Decimal = trades.iter().map(|t| t.notional()).sum();
    volume >= Decimal::from_count(MIN_VOLUME_FIRST_30M_USD)
}

/// No silence longer than the gap limit between consecutive early trades.
/// A window with fewer than two trades cannot demonstrate continuity.
fn trade_gap(ctx: &FilterContext) -> bool {
    let trades = early_window(ctx);
    if trades.len() < 2 {
        return false;
    }
    let limit_ms = TRADE_GAP_LIMIT_MINUTES * crate::domain::MINUTE_MS;
    trades
        .windows(2)
        .all(|pair| pair[1].time_ms.as_ms() - pair[0].time_ms.as_ms() <= limit_ms)
}

/// Trades inside `[first_trade, first_trade + 30m)`. Anchored at the
/// token's first trade, which is known before any detection exists.
fn early_window<'a>(ctx: &'a FilterContext) -> Vec<&'a Trade> {
    let anchor = ctx
        .token
        .first_trade_ms
        .or_else(|| ctx.trades.first().map(|t| t.time_ms));
    let Some(anchor) = anchor else {
        return Vec::new();
    };
    let cutoff: TimeMs = anchor.plus_minutes(EARLY_WINDOW_MINUTES);
    ctx.trades
        .iter()
        .filter(|t| t.time_ms >= anchor && t.time_ms < cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mint, Side, Signature, Wallet};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn trade(sig: &str, notional: &str, liquidity: &str, time_ms: i64) -> Trade {
        Trade::new(
            Mint::new("MINT_A"),
            Wallet::new("W1"),
            Side::Buy,
            dec(notional),
            dec("1"),
            Some(dec(liquidity)),
            Signature::new(sig),
            1,
            TimeMs::new(time_ms),
        )
    }

    /// 20 trades, one per minute, $1k notional each, $60k liquidity.
    fn passing_trades() -> Vec<Trade> {
        (0..20)
            .map(|i| trade(&format!("s{}", i), "1000", "60000", i * 60_000))
            .collect()
    }

    fn token(first_trade_ms: i64) -> Token {
        Token::pre_eligible(Mint::new("MINT_A"), TimeMs::new(first_trade_ms))
    }

    #[test]
    fn test_passing_chain() {
        let trades = passing_trades();
        let token = token(0);
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), None);
    }

    #[test]
    fn test_trade_count_first_failure() {
        let trades = passing_trades()[..10].to_vec();
        let token = token(0);
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), Some("min_trade_count"));
    }

    #[test]
    fn test_peak_liquidity_failure() {
        let trades: Vec<Trade> = (0..20)
            .map(|i| trade(&format!("s{}", i), "1000", "40000", i * 60_000))
            .collect();
        let token = token(0);
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), Some("peak_liquidity"));
    }

    #[test]
    fn test_peak_liquidity_uses_token_running_peak() {
        let trades: Vec<Trade> = (0..20)
            .map(|i| trade(&format!("s{}", i), "1000", "40000", i * 60_000))
            .collect();
        let mut token = token(0);
        // Ingestion saw a $55k print that is outside this trade slice.
        token.peak_liquidity = dec("55000");
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), None);
    }

    #[test]
    fn test_early_volume_failure() {
        // $100 per trade: only $2k lands inside the first 30 minutes.
        let trades: Vec<Trade> = (0..20)
            .map(|i| trade(&format!("s{}", i), "100", "60000", i * 60_000))
            .collect();
        let token = token(0);
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), Some("early_volume"));
    }

    #[test]
    fn test_trade_gap_failure() {
        // Front-load volume, then go quiet for 15 minutes mid-window.
        let mut trades = vec![
            trade("s0", "3000", "60000", 0),
            trade("s1", "3000", "60000", 60_000),
            trade("s2", "1000", "60000", 16 * 60_000),
        ];
        for i in 3..20 {
            trades.push(trade(&format!("s{}", i), "1000", "60000", (i + 30) * 60_000));
        }
        let token = token(0);
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), Some("trade_gap"));
    }

    #[test]
    fn test_trade_gap_requires_two_early_trades() {
        let mut trades = vec![trade("s0", "6000", "60000", 0)];
        for i in 1..20 {
            trades.push(trade(&format!("s{}", i), "1000", "60000", (i + 30) * 60_000));
        }
        let token = token(0);
        let ctx = FilterContext {
            token: &token,
            trades: &trades,
        };
        assert_eq!(first_failure(&ctx), Some("trade_gap"));
    }
}
