//! Tagged webhook event model.
//!
//! The enhanced-transaction provider posts a JSON array of transaction objects.
//! Each object is normalized into a `TxEvent` with an exhaustive `EventKind`
//! instead of shape-sniffing the raw JSON downstream.

use crate::domain::{Decimal, Mint, Side, Signature, TimeMs, Wallet};
use serde::Deserialize;
use thiserror::Error;

/// One transaction from the webhook payload, normalized.
#[derive(Debug, Clone)]
pub struct TxEvent {
    pub signature: Signature,
    pub slot: i64,
    pub time_ms: TimeMs,
    pub kind: EventKind,
}

/// What the transaction contained. Exhaustive: anything that is not a
/// swap we recognize is `Other`, never silently reinterpreted.
#[derive(Debug, Clone)]
pub enum EventKind {
    Swap(SwapEvent),
    Other,
}

/// A swap with its token legs and provider-supplied market context.
#[derive(Debug, Clone)]
pub struct SwapEvent {
    pub legs: Vec<SwapLeg>,
    /// USD price of the traded token at execution, if the provider supplied it.
    pub price_usd: Option<Decimal>,
    /// Pool liquidity in USD at execution, if the provider supplied it.
    pub liquidity_usd: Option<Decimal>,
    /// Native currency paid in (lamports already scaled to SOL).
    pub native_in: Option<Decimal>,
    /// Native currency received (scaled to SOL).
    pub native_out: Option<Decimal>,
}

/// One token-transfer side of a swap transaction.
#[derive(Debug, Clone)]
pub struct SwapLeg {
    pub mint: Mint,
    pub wallet: Wallet,
    pub amount: Decimal,
    pub side: Side,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("transaction is missing required fields: {0}")]
    MissingFields(&'static str),
}

// Wire shapes, lenient on purpose: required-field enforcement happens in
// `TxEvent::from_json` so every reject maps to exactly one reason.
#[derive(Debug, Deserialize)]
struct RawTx {
    signature: Option<String>,
    slot: Option<i64>,
    timestamp: Option<i64>,
    #[serde(default)]
    events: RawEvents,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvents {
    swap: Option<RawSwap>,
}

#[derive(Debug, Deserialize)]
struct RawSwap {
    #[serde(default, rename = "tokenInputs")]
    token_inputs: Vec<RawLeg>,
    #[serde(default, rename = "tokenOutputs")]
    token_outputs: Vec<RawLeg>,
    #[serde(rename = "nativeInput")]
    native_input: Option<RawNative>,
    #[serde(rename = "nativeOutput")]
    native_output: Option<RawNative>,
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    #[serde(rename = "liquidityUsd")]
    liquidity_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    mint: Option<String>,
    #[serde(rename = "userAccount")]
    user_account: Option<String>,
    #[serde(rename = "rawTokenAmount")]
    raw_token_amount: Option<RawTokenAmount>,
}

#[derive(Debug, Deserialize)]
struct RawTokenAmount {
    #[serde(rename = "tokenAmount")]
    token_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNative {
    amount: Option<String>,
}

const LAMPORTS_PER_SOL: &str = "1000000000";

impl TxEvent {
    /// Normalize one provider transaction object.
    ///
    /// # Errors
    /// Returns `MissingFields` when signature, slot, or timestamp is absent;
    /// everything else degrades to `EventKind::Other` or a leg being skipped.
    pub fn from_json(value: &serde_json::Value) -> Result<TxEvent, EventParseError> {
        let raw: RawTx = serde_json::from_value(value.clone())
            .map_err(|_| EventParseError::MissingFields("unparseable transaction object"))?;

        let signature = raw
            .signature
            .filter(|s| !s.is_empty())
            .ok_or(EventParseError::MissingFields("signature"))?;
        let slot = raw.slot.ok_or(EventParseError::MissingFields("slot"))?;
        let timestamp = raw
            .timestamp
            .ok_or(EventParseError::MissingFields("timestamp"))?;

        let kind = match raw.events.swap {
            Some(swap) => EventKind::Swap(normalize_swap(swap)),
            None => EventKind::Other,
        };

        Ok(TxEvent {
            signature: Signature::new(signature),
            slot,
            // Provider timestamps are whole seconds.
            time_ms: TimeMs::new(timestamp * 1000),
            kind,
        })
    }

    /// The swap event, if this transaction carried one.
    pub fn swap(&self) -> Option<&SwapEvent> {
        match &self.kind {
            EventKind::Swap(swap) => Some(swap),
            EventKind::Other => None,
        }
    }
}

fn normalize_swap(raw: RawSwap) -> SwapEvent {
    let mut legs = Vec::new();
    for leg in &raw.token_outputs {
        if let Some(leg) = normalize_leg(leg, Side::Buy) {
            legs.push(leg);
        }
    }
    for leg in &raw.token_inputs {
        if let Some(leg) = normalize_leg(leg, Side::Sell) {
            legs.push(leg);
        }
    }

    SwapEvent {
        legs,
        price_usd: raw.price_usd.as_deref().and_then(parse_decimal),
        liquidity_usd: raw.liquidity_usd.as_deref().and_then(parse_decimal),
        native_in: native_amount(&raw.native_input),
        native_out: native_amount(&raw.native_output),
    }
}

fn normalize_leg(raw: &RawLeg, side: Side) -> Option<SwapLeg> {
    let mint = raw.mint.as_deref().filter(|m| !m.is_empty())?;
    let wallet = raw.user_account.as_deref().filter(|w| !w.is_empty())?;
    let amount = raw
        .raw_token_amount
        .as_ref()
        .and_then(|a| a.token_amount.as_deref())
        .and_then(parse_decimal)?;
    if !amount.is_positive() {
        return None;
    }

    Some(SwapLeg {
        mint: Mint::new(mint),
        wallet: Wallet::new(wallet),
        amount,
        side,
    })
}

fn native_amount(raw: &Option<RawNative>) -> Option<Decimal> {
    let lamports = raw.as_ref()?.amount.as_deref().and_then(parse_decimal)?;
    let scale = Decimal::from_str_canonical(LAMPORTS_PER_SOL).expect("scale literal");
    Some(lamports / scale)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str_canonical(s).ok()
}

impl SwapEvent {
    /// Effective per-token price for a leg: provider USD price when present,
    /// otherwise the native-amount / token-amount ratio for that direction.
    pub fn leg_price(&self, leg: &SwapLeg) -> Decimal {
        if let Some(price) = self.price_usd {
            return price;
        }
        let native = match leg.side {
            Side::Buy => self.native_in,
            Side::Sell => self.native_out,
        };
        match native {
            Some(n) if leg.amount.is_positive() => n / leg.amount,
            _ => Decimal::zero(),
        }
    }
}
