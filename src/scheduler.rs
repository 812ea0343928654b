//! Background scheduler: the three worker loops that drive the pipeline.
//!
//! Each loop captures the wall clock exactly once per tick and hands that
//! instant down; nothing below the scheduler reads the clock, so every
//! pass is replayable against a fixed `now`. Worker errors are logged and
//! the loop keeps ticking.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::TimeMs;
use crate::features::FeatureEngine;
use crate::gate::GateWorker;
use crate::ingest::IngestWorker;
use crate::labeler::LabelWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info};

pub struct Scheduler {
    repo: Arc<Repository>,
    config: Arc<Config>,
}

impl Scheduler {
    pub fn new(repo: Arc<Repository>, config: Arc<Config>) -> Self {
        Scheduler { repo, config }
    }

    /// Spawn the ingest, gate, and label loops as detached tasks.
    pub fn spawn(self) {
        let ingest = IngestWorker::new(Arc::clone(&self.repo), Arc::clone(&self.config));
        let gate = GateWorker::new(
            Arc::clone(&self.repo),
            FeatureEngine::new(Arc::clone(&self.repo), self.config.feature),
        );
        let labeler = LabelWorker::new(Arc::clone(&self.repo), Arc::clone(&self.config));

        info!(
            ingest_ms = self.config.ingest_interval_ms,
            gate_ms = self.config.gate_interval_ms,
            label_ms = self.config.label_interval_ms,
            "scheduler starting"
        );

        let ingest_interval = self.config.ingest_interval_ms;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(ingest_interval));
            loop {
                ticker.tick().await;
                match ingest.process_batch(TimeMs::now()).await {
                    Ok(stats) if !stats.is_empty() => debug!(
                        events = stats.events_received,
                        inserted = stats.swaps_inserted,
                        ignored = stats.total_ignored(),
                        "ingest pass"
                    ),
                    Ok(_) => {}
                    Err(e) => error!("ingest pass failed: {e}"),
                }
            }
        });

        let gate_interval = self.config.gate_interval_ms;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(gate_interval));
            loop {
                ticker.tick().await;
                match gate.run_pass(TimeMs::now()).await {
                    Ok(promoted) if promoted > 0 => debug!(promoted, "gate pass"),
                    Ok(_) => {}
                    Err(e) => error!("gate pass failed: {e}"),
                }
            }
        });

        let label_interval = self.config.label_interval_ms;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(label_interval));
            loop {
                ticker.tick().await;
                match labeler.run_pass(TimeMs::now()).await {
                    Ok(labeled) if labeled > 0 => debug!(labeled, "label pass"),
                    Ok(_) => {}
                    Err(e) => error!("label pass failed: {e}"),
                }
            }
        });
    }
}
