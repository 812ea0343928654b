//! Domain types and determinism layer for the swap-event pipeline.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Mint, Wallet, Signature, Side
//! - The tagged webhook event model (TxEvent/EventKind)
//! - Trade, Token, FeatureSnapshot, and LifecycleLabel types

pub mod decimal;
pub mod event;
pub mod label;
pub mod primitives;
pub mod snapshot;
pub mod token;
pub mod trade;

pub use decimal::Decimal;
pub use event::{EventKind, EventParseError, SwapEvent, SwapLeg, TxEvent};
pub use label::{LifecycleLabel, Outcome};
pub use primitives::{Mint, Side, Signature, TimeMs, Wallet, HOUR_MS, MINUTE_MS};
pub use snapshot::{
    FeatureConfig, FeatureSnapshot, FeatureVector, MarketPhase, ScoreLabel, ScoreRecord,
};
pub use token::{LifecycleStage, Token};
pub use trade::Trade;
