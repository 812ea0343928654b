pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod features;
pub mod gate;
pub mod ingest;
pub mod labeler;
pub mod scheduler;
pub mod scoring;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Decimal, FeatureSnapshot, FeatureVector, LifecycleLabel, LifecycleStage, Mint, Outcome,
    ScoreRecord, Side, TimeMs, Token, Trade, Wallet,
};
pub use error::AppError;
pub use scheduler::Scheduler;
