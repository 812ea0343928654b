//! Append-only trade store.
//!
//! Decimal columns are canonical strings; window statistics are computed
//! by the gate/feature/label engines from fetched rows so every pass sees
//! exactly the values that were written.

use super::Repository;
use crate::domain::{Decimal, Mint, Side, Signature, TimeMs, Trade, Wallet};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn map_trade_row(row: &SqliteRow) -> Result<Trade, sqlx::Error> {
    let side_str: String = row.get("side");
    let side = Side::parse(&side_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("invalid side in trades row: {}", side_str).into())
    })?;

    let amount = parse_decimal_col(row, "amount")?;
    let price = parse_decimal_col(row, "price")?;
    let liquidity = row
        .get::<Option<String>, _>("liquidity")
        .map(|s| {
            Decimal::from_str_canonical(&s)
                .map_err(|e| sqlx::Error::Decode(format!("invalid liquidity: {}", e).into()))
        })
        .transpose()?;

    Ok(Trade {
        leg_key: row.get("leg_key"),
        mint: Mint::new(row.get::<String, _>("mint")),
        wallet: Wallet::new(row.get::<String, _>("wallet")),
        side,
        amount,
        price,
        liquidity,
        signature: Signature::new(row.get::<String, _>("signature")),
        slot: row.get("slot"),
        time_ms: TimeMs::new(row.get("time_ms")),
    })
}

fn parse_decimal_col(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let s: String = row.get(col);
    Decimal::from_str_canonical(&s)
        .map_err(|e| sqlx::Error::Decode(format!("invalid {} column: {}", col, e).into()))
}

const TRADE_COLUMNS: &str =
    "mint, wallet, side, amount, price, liquidity, signature, leg_key, slot, time_ms";

impl Repository {
    /// Insert a trade leg. Returns false when the leg key already exists,
    /// which is the replay signal, not an error.
    pub async fn insert_trade(&self, trade: &Trade) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO trades (mint, wallet, side, amount, price, liquidity, signature, leg_key, slot, time_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(leg_key) DO NOTHING",
        )
        .bind(trade.mint.as_str())
        .bind(trade.wallet.as_str())
        .bind(trade.side.to_string())
        .bind(trade.amount.to_canonical_string())
        .bind(trade.price.to_canonical_string())
        .bind(trade.liquidity.map(|l| l.to_canonical_string()))
        .bind(trade.signature.as_str())
        .bind(trade.leg_key())
        .bind(trade.slot)
        .bind(trade.time_ms.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All trades for a mint with `time_ms < until`.
    pub async fn trades_until(
        &self,
        mint: &Mint,
        until: TimeMs,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trades
             WHERE mint = ? AND time_ms < ?
             ORDER BY time_ms ASC, id ASC",
            TRADE_COLUMNS
        ))
        .bind(mint.as_str())
        .bind(until.as_ms())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_trade_row).collect()
    }

    /// Trade count for a mint with `time_ms < until`.
    pub async fn trade_count_until(&self, mint: &Mint, until: TimeMs) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM trades WHERE mint = ? AND time_ms < ?")
                .bind(mint.as_str())
                .bind(until.as_ms())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
