//! The ingestion worker: raw queued payloads in, trade rows out.
//!
//! Every rejected payload or leg maps to exactly one ignore reason, and a
//! bad item never takes its batch siblings down with it. Re-processing any
//! payload is harmless: the trade store's leg-key uniqueness absorbs it.

use crate::config::Config;
use crate::db::repo::{BatchStats, RawEvent, Repository};
use crate::domain::{SwapEvent, SwapLeg, TimeMs, Trade, TxEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub struct IngestWorker {
    repo: Arc<Repository>,
    config: Arc<Config>,
}

impl IngestWorker {
    pub fn new(repo: Arc<Repository>, config: Arc<Config>) -> Self {
        IngestWorker { repo, config }
    }

    /// Drain one batch from the queue. Returns the counters recorded for
    /// this pass.
    pub async fn process_batch(&self, now: TimeMs) -> Result<BatchStats, IngestError> {
        let mut stats = BatchStats::default();
        let batch = self.repo.dequeue_batch(self.config.ingest_batch_size).await?;

        for event in &batch {
            if !self.config.ingestion_enabled {
                // Flipped off after enqueue: acknowledge without writing.
                stats.ignored_ingestion_disabled += 1;
                self.repo.ack_raw_event(event.id, now).await?;
                continue;
            }

            match self.process_event(event, &mut stats).await {
                Ok(()) => self.repo.ack_raw_event(event.id, now).await?,
                Err(reason) => {
                    warn!(event_id = event.id, %reason, "raw event failed");
                    stats.ignored_exception += 1;
                    self.repo.fail_raw_event(event.id, &reason, now).await?;
                }
            }
        }

        self.repo.record_batch_stats(&stats, now).await?;
        if !stats.is_empty() {
            debug!(
                received = stats.events_received,
                inserted = stats.swaps_inserted,
                ignored = stats.total_ignored(),
                "ingestion batch complete"
            );
        }
        Ok(stats)
    }

    /// Process one raw payload: a JSON array of transaction objects.
    /// Returns a failure reason only for payload-level breakage; per-item
    /// and per-leg problems are counted and absorbed.
    async fn process_event(
        &self,
        event: &RawEvent,
        stats: &mut BatchStats,
    ) -> Result<(), String> {
        let value: serde_json::Value = serde_json::from_str(&event.payload)
            .map_err(|e| format!("payload is not valid JSON: {}", e))?;
        let items = value
            .as_array()
            .ok_or_else(|| "payload is not a JSON array".to_string())?;

        for item in items {
            stats.events_received += 1;

            let tx = match TxEvent::from_json(item) {
                Ok(tx) => tx,
                Err(err) => {
                    debug!(event_id = event.id, %err, "transaction rejected");
                    stats.ignored_missing_fields += 1;
                    continue;
                }
            };

            let Some(swap) = tx.swap() else {
                stats.ignored_no_swap_event += 1;
                continue;
            };

            let tracked: Vec<&SwapLeg> = swap
                .legs
                .iter()
                .filter(|leg| self.config.is_tracked(&leg.mint))
                .collect();
            if tracked.is_empty() {
                stats.ignored_no_tracked_tokens += 1;
                continue;
            }

            for leg in tracked {
                self.ingest_leg(&tx, swap, leg, stats).await;
            }
        }

        Ok(())
    }

    /// Insert one leg, isolated from its siblings.
    async fn ingest_leg(
        &self,
        tx: &TxEvent,
        swap: &SwapEvent,
        leg: &SwapLeg,
        stats: &mut BatchStats,
    ) {
        let trade = Trade::new(
            leg.mint.clone(),
            leg.wallet.clone(),
            leg.side,
            leg.amount,
            swap.leg_price(leg),
            swap.liquidity_usd,
            tx.signature.clone(),
            tx.slot,
            tx.time_ms,
        );

        match self.repo.insert_trade(&trade).await {
            Ok(true) => {
                // The trade is in, so the leg stays counted as inserted;
                // a sighting that failed here catches up on the next leg.
                stats.swaps_inserted += 1;
                if let Err(err) = self.register_sighting(&trade, swap).await {
                    warn!(mint = %trade.mint, %err, "token bookkeeping failed");
                }
            }
            Ok(false) => {
                // Leg key already present: a redelivered or overlapping payload.
                stats.ignored_constraint_violation += 1;
            }
            Err(err) => {
                warn!(mint = %trade.mint, signature = %trade.signature, %err, "leg insert failed");
                stats.ignored_exception += 1;
            }
        }
    }

    async fn register_sighting(&self, trade: &Trade, swap: &SwapEvent) -> Result<(), sqlx::Error> {
        self.repo
            .upsert_token_sighting(&trade.mint, trade.time_ms)
            .await?;
        if let Some(liquidity) = swap.liquidity_usd {
            self.repo.raise_peak_liquidity(&trade.mint, liquidity).await?;
        }
        Ok(())
    }
}
