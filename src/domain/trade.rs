//! Trade type: one leg of a swap, the append-only unit of the trade store.

use crate::domain::{Decimal, Mint, Side, Signature, TimeMs, Wallet};
use serde::{Deserialize, Serialize};

/// One token leg of a swap transaction.
///
/// Never updated or deleted after insert. Idempotency is carried by
/// `leg_key`, unique per (signature, leg) so a multi-token swap can
/// contribute several trades while replays contribute none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Stable unique identifier for this leg.
    pub leg_key: String,
    pub mint: Mint,
    pub wallet: Wallet,
    pub side: Side,
    /// Token amount moved by this leg.
    pub amount: Decimal,
    /// Per-token price at execution (USD when supplied, otherwise the
    /// native ratio).
    pub price: Decimal,
    /// Pool liquidity in USD at the time of the trade, when known.
    pub liquidity: Option<Decimal>,
    pub signature: Signature,
    pub slot: i64,
    pub time_ms: TimeMs,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mint: Mint,
        wallet: Wallet,
        side: Side,
        amount: Decimal,
        price: Decimal,
        liquidity: Option<Decimal>,
        signature: Signature,
        slot: i64,
        time_ms: TimeMs,
    ) -> Self {
        let leg_key = Self::compute_leg_key(&signature, &mint, &wallet, side, &amount);
        Trade {
            leg_key,
            mint,
            wallet,
            side,
            amount,
            price,
            liquidity,
            signature,
            slot,
            time_ms,
        }
    }

    /// Deterministic leg discriminator.
    ///
    /// Two legs of the same transaction differ in mint, wallet, side, or
    /// amount; a re-delivered copy of the same leg hashes identically and
    /// hits the uniqueness constraint.
    pub fn compute_leg_key(
        signature: &Signature,
        mint: &Mint,
        wallet: &Wallet,
        side: Side,
        amount: &Decimal,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(signature.as_str());
        hasher.update(mint.as_str());
        hasher.update(wallet.as_str());
        hasher.update(if side == Side::Buy { b"B" } else { b"S" });
        hasher.update(amount.to_canonical_string());
        let hash = hasher.finalize();
        format!("leg:{}", hex::encode(&hash[..16]))
    }

    /// Borrow the precomputed leg key.
    pub fn leg_key(&self) -> &str {
        &self.leg_key
    }

    /// Notional value of this leg (amount * price).
    pub fn notional(&self) -> Decimal {
        self.amount * self.price
    }
}
