//! Rewarder configuration
//!
//! Layered: a TOML file with one `[networks.<name>]` table per deployment
//! plus `[scan]` tunables, overridable through `REWARDER_`-prefixed
//! environment variables. Signing key material never lives in the file; it
//! comes from the environment only (`.env` supported).

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

/// Environment variable holding the hex private key of the paying account.
const PRIVATE_KEY_VAR: &str = "REWARD_PRIVATE_KEY";

/// Scan-loop tunables, shared across networks.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    /// Sleep between scan iterations, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Minimum head-minus-cursor distance before a scan runs
    #[serde(default = "default_min_advance")]
    pub min_advance: u64,
    /// Maximum blocks consumed per iteration, and the log-query chunk size
    #[serde(default = "default_max_step")]
    pub max_step: u64,
    /// Recipients per payment transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Per-address reward in wei, decimal string
    #[serde(default = "default_reward_amount_wei")]
    pub reward_amount_wei: String,
    /// How long to wait for a payment receipt before giving up
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Log intended payments instead of submitting them
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            min_advance: default_min_advance(),
            max_step: default_max_step(),
            batch_size: default_batch_size(),
            reward_amount_wei: default_reward_amount_wei(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            dry_run: false,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_min_advance() -> u64 {
    100
}

fn default_max_step() -> u64 {
    10_000
}

fn default_batch_size() -> usize {
    100
}

fn default_reward_amount_wei() -> String {
    // 0.1 ether
    "100000000000000000".to_string()
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_health_port() -> u16 {
    9099
}

/// One deployment target in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    pub rpc_url: String,
    /// Batch-send reward contract
    pub batch_send_address: String,
    /// Bridged token contracts whose mints mark new bridge users
    pub tokens: Vec<String>,
    /// First block the bridge tokens could have minted at; initial cursor
    pub bridge_deploy_block: u64,
    /// First block the reward contract could have paid at; ledger seeding
    /// starts here
    pub payout_deploy_block: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct FileSettings {
    #[serde(default)]
    scan: ScanSettings,
    #[serde(default = "default_health_port")]
    health_port: u16,
    networks: HashMap<String, NetworkSettings>,
}

/// Fully resolved configuration for one network, consumed once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Instance ID for multi-instance deployments
    pub rewarder_id: String,
    pub network: String,
    pub rpc_url: String,
    pub batch_send_address: Address,
    pub tokens: Vec<Address>,
    pub bridge_deploy_block: u64,
    pub payout_deploy_block: u64,
    pub reward_amount: U256,
    pub batch_size: usize,
    pub dry_run: bool,
    pub poll_interval_ms: u64,
    pub min_advance: u64,
    pub max_step: u64,
    pub receipt_timeout_secs: u64,
    pub health_port: u16,
    /// Absent only in dry-run mode
    pub private_key: Option<String>,
}

impl Config {
    /// Load configuration for the named network.
    ///
    /// Reads `config.toml` (path overridable via `REWARDER_CONFIG`, without
    /// extension), applies `REWARDER_`-prefixed environment overrides, then
    /// resolves the requested `[networks.<name>]` table.
    pub fn load(network: &str) -> Result<Self> {
        // Try to load .env file
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        let file = env::var("REWARDER_CONFIG").unwrap_or_else(|_| "config".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file))
            .add_source(config::Environment::with_prefix("REWARDER").separator("__"))
            .build()
            .wrap_err_with(|| format!("failed to read configuration from {file}"))?;

        let parsed: FileSettings = settings
            .try_deserialize()
            .wrap_err("configuration file has unexpected shape")?;

        let net = parsed
            .networks
            .get(network)
            .ok_or_else(|| eyre!("network {network:?} is not defined in {file}"))?;

        let batch_send_address = Address::from_str(&net.batch_send_address)
            .wrap_err_with(|| format!("invalid batch_send_address for {network}"))?;

        if net.tokens.is_empty() {
            return Err(eyre!("network {network} lists no token contracts to watch"));
        }
        let tokens = net
            .tokens
            .iter()
            .map(|t| {
                Address::from_str(t).wrap_err_with(|| format!("invalid token address {t:?}"))
            })
            .collect::<Result<Vec<Address>>>()?;

        let scan = parsed.scan;
        let reward_amount = U256::from_str(&scan.reward_amount_wei)
            .map_err(|e| eyre!("invalid reward_amount_wei: {e}"))?;
        if reward_amount.is_zero() {
            return Err(eyre!("reward_amount_wei must be non-zero"));
        }
        if scan.batch_size == 0 {
            return Err(eyre!("batch_size must be at least 1"));
        }
        if scan.min_advance == 0 || scan.max_step == 0 {
            return Err(eyre!("min_advance and max_step must be at least 1"));
        }

        let private_key = env::var(PRIVATE_KEY_VAR).ok();
        if private_key.is_none() && !scan.dry_run {
            return Err(eyre!(
                "{PRIVATE_KEY_VAR} is required unless scan.dry_run is set"
            ));
        }

        // Default instance ID from hostname
        let rewarder_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| format!("rewarder-{}", std::process::id()));

        Ok(Self {
            rewarder_id,
            network: network.to_string(),
            rpc_url: net.rpc_url.clone(),
            batch_send_address,
            tokens,
            bridge_deploy_block: net.bridge_deploy_block,
            payout_deploy_block: net.payout_deploy_block,
            reward_amount,
            batch_size: scan.batch_size,
            dry_run: scan.dry_run,
            poll_interval_ms: scan.poll_interval_ms,
            min_advance: scan.min_advance,
            max_step: scan.max_step,
            receipt_timeout_secs: scan.receipt_timeout_secs,
            health_port: parsed.health_port,
            private_key,
        })
    }
}
