use std::{fs, path::PathBuf, time::Duration};

use alloy::primitives::Address;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The chain heartbeats are published on and read back from.
    pub primary: PrimaryChainConfig,
    /// Chains whose state is sampled and reported, in the order they appear in each heartbeat.
    #[serde(default)]
    pub secondaries: Vec<ChainConfig>,
    /// Chain ids the primary chain is allowed to have. Defaults to RSK mainnet, testnet and regtest.
    #[serde(default = "expected_chain_ids_default")]
    pub expected_chain_ids: Vec<u64>,
    /// Directory containing the checkpoint file. Created if it does not exist.
    #[serde(default = "storage_path_default")]
    pub storage_path: PathBuf,
    /// Number of blocks requested in a single log query. Defaults to 1000.
    #[serde(default = "page_size_default")]
    pub page_size: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Time between heartbeat emissions. Defaults to one hour.
    #[serde(default = "emit_interval_default")]
    pub emit_interval: Duration,
    /// Time between log synchronisation rounds. Defaults to five minutes.
    #[serde(default = "sync_interval_default")]
    pub sync_interval: Duration,
    /// The base address of the OTLP collector. If not set, metrics will not be exported.
    #[serde(default)]
    pub otlp_collector_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrimaryChainConfig {
    pub rpc_url: String,
    /// Address of the federation contract which emits and records heartbeats.
    pub federation_address: Address,
    /// Logs at or below this block are never scanned, whatever the checkpoint says.
    #[serde(default)]
    pub from_block: u64,
    /// How long to wait for a heartbeat transaction to be mined before the attempt fails. Defaults to two minutes.
    #[serde(default = "receipt_timeout_default")]
    pub receipt_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub rpc_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "max_attempts_default")]
    pub max_attempts: u32,
    /// Fixed delay between two attempts.
    #[serde(default = "backoff_default")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: max_attempts_default(),
            backoff: backoff_default(),
        }
    }
}

pub fn expected_chain_ids_default() -> Vec<u64> {
    vec![30, 31, 33]
}

pub fn storage_path_default() -> PathBuf {
    PathBuf::from("./db")
}

pub fn page_size_default() -> u64 {
    1000
}

pub fn max_attempts_default() -> u32 {
    3
}

pub fn backoff_default() -> Duration {
    Duration::from_millis(3000)
}

pub fn receipt_timeout_default() -> Duration {
    Duration::from_secs(2 * 60)
}

pub fn emit_interval_default() -> Duration {
    Duration::from_secs(60 * 60)
}

pub fn sync_interval_default() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(anyhow!("page_size must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.expected_chain_ids.is_empty() {
            return Err(anyhow!("at least one expected chain id must be configured"));
        }
        Ok(())
    }

    /// Location of the file holding the last processed block.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.storage_path.join("heartBeatLastBlock.txt")
    }
}

/// Reads and merges the given configuration files. A top-level key may only be set by one file.
pub fn read_config(config_files: &[PathBuf]) -> Result<Config> {
    let mut merged_config = toml::Table::new();
    for config_file in config_files {
        let config = fs::read_to_string(config_file)
            .map_err(|e| anyhow!("failed to read {config_file:?}: {e}"))?;
        let config: toml::Table = toml::from_str(&config)?;
        for key in config.keys() {
            if merged_config.contains_key(key) {
                return Err(anyhow!(
                    "configuration conflict: {config_file:?} contained a key {key:?} that was already included in an earlier file"
                ));
            }
        }
        merged_config.extend(config);
    }

    let config: Config = Deserialize::deserialize(merged_config)?;
    config.validate()?;
    Ok(config)
}
