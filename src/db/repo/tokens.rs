//! Token lifecycle bookkeeping.
//!
//! The gate and label workers are the only writers; `detected_ms` is
//! additionally frozen by a schema trigger so an accidental second
//! promotion fails loudly instead of shifting every downstream window.

use super::Repository;
use crate::domain::{Decimal, LifecycleStage, Mint, TimeMs, Token};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn map_token_row(row: &SqliteRow) -> Result<Token, sqlx::Error> {
    let stage_str: String = row.get("stage");
    let stage = LifecycleStage::parse(&stage_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("invalid stage in tokens row: {}", stage_str).into())
    })?;

    let peak: String = row.get("peak_liquidity");
    let peak_liquidity = Decimal::from_str_canonical(&peak)
        .map_err(|e| sqlx::Error::Decode(format!("invalid peak_liquidity: {}", e).into()))?;

    let baseline_price = row
        .get::<Option<String>, _>("baseline_price")
        .map(|s| {
            Decimal::from_str_canonical(&s)
                .map_err(|e| sqlx::Error::Decode(format!("invalid baseline_price: {}", e).into()))
        })
        .transpose()?;

    Ok(Token {
        mint: Mint::new(row.get::<String, _>("mint")),
        stage,
        first_trade_ms: row.get::<Option<i64>, _>("first_trade_ms").map(TimeMs::new),
        liquidity_crossed_ms: row
            .get::<Option<i64>, _>("liquidity_crossed_ms")
            .map(TimeMs::new),
        detected_ms: row.get::<Option<i64>, _>("detected_ms").map(TimeMs::new),
        peak_liquidity,
        baseline_price,
        resolved_ms: row.get::<Option<i64>, _>("resolved_ms").map(TimeMs::new),
    })
}

const TOKEN_COLUMNS: &str = "mint, stage, first_trade_ms, liquidity_crossed_ms, detected_ms, \
                             peak_liquidity, baseline_price, resolved_ms";

impl Repository {
    /// Register a token sighting. First sight creates the row at
    /// `pre_eligible`; later sightings only pull `first_trade_ms` earlier
    /// if an older trade arrived late.
    pub async fn upsert_token_sighting(
        &self,
        mint: &Mint,
        trade_ms: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tokens (mint, stage, first_trade_ms)
             VALUES (?, 'pre_eligible', ?)
             ON CONFLICT(mint) DO UPDATE SET
                 first_trade_ms = MIN(first_trade_ms, excluded.first_trade_ms)",
        )
        .bind(mint.as_str())
        .bind(trade_ms.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raise the recorded liquidity peak if `liquidity` exceeds it.
    /// Comparison happens here because the column is a canonical string.
    pub async fn raise_peak_liquidity(
        &self,
        mint: &Mint,
        liquidity: Decimal,
    ) -> Result<(), sqlx::Error> {
        let Some(token) = self.get_token(mint).await? else {
            return Ok(());
        };
        if liquidity > token.peak_liquidity {
            sqlx::query("UPDATE tokens SET peak_liquidity = ? WHERE mint = ?")
                .bind(liquidity.to_canonical_string())
                .bind(mint.as_str())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn get_token(&self, mint: &Mint) -> Result<Option<Token>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tokens WHERE mint = ?",
            TOKEN_COLUMNS
        ))
        .bind(mint.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_token_row).transpose()
    }

    pub async fn list_tokens_by_stage(
        &self,
        stage: LifecycleStage,
    ) -> Result<Vec<Token>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tokens WHERE stage = ? ORDER BY mint",
            TOKEN_COLUMNS
        ))
        .bind(stage.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_token_row).collect()
    }

    /// Record that liquidity crossed the eligibility threshold and the
    /// sustain countdown started.
    pub async fn mark_liquidity_crossed(
        &self,
        mint: &Mint,
        crossed_ms: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tokens SET stage = ?, liquidity_crossed_ms = ? WHERE mint = ?",
        )
        .bind(LifecycleStage::EligiblePendingSustain.as_str())
        .bind(crossed_ms.as_ms())
        .bind(mint.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Liquidity dipped inside the sustain window: back to square one.
    pub async fn reset_sustain(&self, mint: &Mint) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tokens SET stage = ?, liquidity_crossed_ms = NULL WHERE mint = ?",
        )
        .bind(LifecycleStage::PreEligible.as_str())
        .bind(mint.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Promote a token to active monitoring, freezing `detected_ms`.
    ///
    /// The guard `WHERE detected_ms IS NULL` makes this a no-op on a token
    /// already promoted; returns whether this call won the write.
    pub async fn promote_to_active(
        &self,
        mint: &Mint,
        detected_ms: TimeMs,
        baseline_price: Option<Decimal>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tokens
             SET stage = ?, detected_ms = ?, baseline_price = ?
             WHERE mint = ? AND detected_ms IS NULL",
        )
        .bind(LifecycleStage::ActiveMonitoring.as_str())
        .bind(detected_ms.as_ms())
        .bind(baseline_price.map(|p| p.to_canonical_string()))
        .bind(mint.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Backfill `baseline_price` once a priced trade lands after detection.
    pub async fn set_baseline_price(
        &self,
        mint: &Mint,
        baseline_price: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tokens SET baseline_price = ? WHERE mint = ? AND baseline_price IS NULL",
        )
        .bind(baseline_price.to_canonical_string())
        .bind(mint.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Move a token to a terminal stage. Refuses non-terminal targets.
    pub async fn resolve_token(
        &self,
        mint: &Mint,
        stage: LifecycleStage,
        resolved_ms: TimeMs,
    ) -> Result<(), sqlx::Error> {
        if !stage.is_terminal() {
            return Err(sqlx::Error::Protocol(format!(
                "resolve_token requires a terminal stage, got {}",
                stage
            )));
        }
        sqlx::query("UPDATE tokens SET stage = ?, resolved_ms = ? WHERE mint = ?")
            .bind(stage.as_str())
            .bind(resolved_ms.as_ms())
            .bind(mint.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
