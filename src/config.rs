use crate::domain::{FeatureConfig, Mint};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Shared secret the provider sends in the `x-webhook-secret` header.
    pub webhook_secret: String,
    /// Mints we persist trades for; legs outside this set are skipped.
    pub tracked_tokens: HashSet<Mint>,
    /// Incident-containment switch: accept and acknowledge webhook
    /// payloads without writing them.
    pub ingestion_enabled: bool,
    /// Versioned feature-computation record stamped onto snapshots.
    pub feature: FeatureConfig,
    pub ingest_interval_ms: u64,
    pub gate_interval_ms: u64,
    pub label_interval_ms: u64,
    /// Raw events drained per ingestion pass.
    pub ingest_batch_size: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", "8080")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let webhook_secret = env_map
            .get("WEBHOOK_SECRET")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("WEBHOOK_SECRET".to_string()))?;

        let tracked_tokens = env_map
            .get("TRACKED_TOKENS")
            .map(|s| s.as_str())
            .unwrap_or("")
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Mint::new)
            .collect();

        let ingestion_enabled = match env_map
            .get("INGESTION_ENABLED")
            .map(|s| s.as_str())
            .unwrap_or("true")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "INGESTION_ENABLED".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let feature_version = parse_or(&env_map, "FEATURE_VERSION", "1")?;
        let feature = FeatureConfig {
            version: feature_version,
            pair_scoped: false,
        };

        let ingest_interval_ms = parse_or(&env_map, "INGEST_INTERVAL_MS", "1000")?;
        let gate_interval_ms = parse_or(&env_map, "GATE_INTERVAL_MS", "30000")?;
        let label_interval_ms = parse_or(&env_map, "LABEL_INTERVAL_MS", "60000")?;
        let ingest_batch_size = parse_or(&env_map, "INGEST_BATCH_SIZE", "50")?;

        Ok(Config {
            port,
            database_path,
            webhook_secret,
            tracked_tokens,
            ingestion_enabled,
            feature,
            ingest_interval_ms,
            gate_interval_ms,
            label_interval_ms,
            ingest_batch_size,
        })
    }

    pub fn is_tracked(&self, mint: &Mint) -> bool {
        self.tracked_tokens.contains(mint)
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("must parse as {}", std::any::type_name::<T>()),
            )
        })
}
