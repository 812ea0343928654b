//! Ingestion: drains the raw-event queue into the append-only trade store.

pub mod worker;

pub use worker::{IngestError, IngestWorker};
