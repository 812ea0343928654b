//! Domain primitives: TimeMs, Mint, Wallet, Signature, Side.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 3_600_000;

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time. Only the scheduler boundary should call this;
    /// windowing logic takes TimeMs parameters.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Shift forward by whole minutes.
    pub fn plus_minutes(&self, minutes: i64) -> Self {
        TimeMs(self.0 + minutes * MINUTE_MS)
    }

    /// Shift forward by whole hours.
    pub fn plus_hours(&self, hours: i64) -> Self {
        TimeMs(self.0 + hours * HOUR_MS)
    }

    /// Shift backward by whole minutes, saturating at 0.
    pub fn minus_minutes(&self, minutes: i64) -> Self {
        TimeMs((self.0 - minutes * MINUTE_MS).max(0))
    }

    /// Shift backward by whole hours, saturating at 0.
    pub fn minus_hours(&self, hours: i64) -> Self {
        TimeMs((self.0 - hours * HOUR_MS).max(0))
    }

    /// Truncate to the start of the containing hour bucket.
    pub fn floor_hour(&self) -> Self {
        TimeMs(self.0 - self.0.rem_euclid(HOUR_MS))
    }
}

/// Token mint address (base58 string on Solana).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mint(pub String);

impl Mint {
    /// Create a Mint from a string.
    pub fn new(mint: impl Into<String>) -> Self {
        Mint(mint.into())
    }

    /// Get the mint as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wallet address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Wallet(pub String);

impl Wallet {
    /// Create a Wallet from a string.
    pub fn new(addr: impl Into<String>) -> Self {
        Wallet(addr.into())
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chain-native transaction signature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature(pub String);

impl Signature {
    /// Create a Signature from a string.
    pub fn new(sig: impl Into<String>) -> Self {
        Signature(sig.into())
    }

    /// Get the signature as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade side: Buy or Sell.
///
/// A leg in `tokenOutputs` means the wallet received the token (buy);
/// a leg in `tokenInputs` means it sent the token (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Signed multiplier for net-position arithmetic (+1 buy, -1 sell).
    pub fn sign(&self) -> i32 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    /// Parse from the stored column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_side_parse_rejects_unknown() {
        assert_eq!(Side::parse("buy"), Some(Side::Buy));
        assert_eq!(Side::parse("hold"), None);
    }

    #[test]
    fn test_timems_window_arithmetic() {
        let t = TimeMs::new(HOUR_MS);
        assert_eq!(t.plus_minutes(30).as_ms(), HOUR_MS + 30 * MINUTE_MS);
        assert_eq!(t.minus_hours(1).as_ms(), 0);
        assert_eq!(t.minus_hours(2).as_ms(), 0, "saturates at epoch");
    }

    #[test]
    fn test_timems_floor_hour() {
        let t = TimeMs::new(HOUR_MS + 59 * MINUTE_MS + 999);
        assert_eq!(t.floor_hour().as_ms(), HOUR_MS);
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }

    #[test]
    fn test_mint_display() {
        let mint = Mint::new("So11111111111111111111111111111111111111112");
        assert_eq!(
            mint.to_string(),
            "So11111111111111111111111111111111111111112"
        );
    }
}
