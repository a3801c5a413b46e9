//! Configuration for the payout relayer.
//!
//! Loaded from environment variables, with `.env` support for local runs.
//! Assets are enumerated with `ASSET_COUNT` plus indexed `ASSET_{i}_*`
//! variables.

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::amount::MAX_PRECISION;
use crate::types::{AssetDescriptor, FeeParams, NATIVE_MARKER};

/// Main configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bridge receiving wallet on the source chain.
    pub receiving_wallet: String,
    pub source: NetworkConfig,
    pub destination: NetworkConfig,
    pub assets: Vec<AssetDescriptor>,
    pub guard: GuardConfig,
    pub monitor: MonitorSettings,
    pub rpc: RpcSettings,
    /// Bind address for the ingest/health/metrics server.
    pub bind_addr: String,
}

/// Per-network endpoint configuration
#[derive(Clone)]
pub struct NetworkConfig {
    pub chain: String,
    pub rpc_url: String,
    /// Node-managed submission account; only the destination sets one.
    pub submitter: Option<String>,
    pub native_decimals: u32,
    pub fee_params: FeeParams,
}

/// Custom Debug that redacts the submitter account to keep payout routing
/// details out of logs.
impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("chain", &self.chain)
            .field("rpc_url", &self.rpc_url)
            .field("submitter", &self.submitter.as_ref().map(|_| "<redacted>"))
            .field("native_decimals", &self.native_decimals)
            .field("fee_params", &self.fee_params)
            .finish()
    }
}

/// Idempotency guard configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Interval at which the record set is cleared wholesale.
    pub expiry: Duration,
}

/// Confirmation monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub scan_chunk: u64,
}

/// RPC retry configuration
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub retry_budget: u32,
    pub initial_backoff: Duration,
}

/// Default functions
fn default_guard_expiry_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_scan_chunk() -> u64 {
    5
}

fn default_retry_budget() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_gas_limit() -> u64 {
    90_000
}

fn default_gas_price() -> u128 {
    1_000_000_000
}

fn default_native_decimals() -> u32 {
    18
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads a .env file if present, then reads from the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let receiving_wallet = env::var("RECEIVING_WALLET")
            .map_err(|_| eyre!("RECEIVING_WALLET environment variable is required"))?;

        let source = NetworkConfig {
            chain: env::var("SOURCE_CHAIN").unwrap_or_else(|_| "source".to_string()),
            rpc_url: env::var("SOURCE_RPC_URL")
                .map_err(|_| eyre!("SOURCE_RPC_URL environment variable is required"))?,
            submitter: None,
            native_decimals: env_or("SOURCE_NATIVE_DECIMALS", default_native_decimals()),
            fee_params: FeeParams {
                gas_limit: default_gas_limit(),
                gas_price: default_gas_price(),
            },
        };

        let destination = NetworkConfig {
            chain: env::var("DESTINATION_CHAIN").unwrap_or_else(|_| "destination".to_string()),
            rpc_url: env::var("DESTINATION_RPC_URL")
                .map_err(|_| eyre!("DESTINATION_RPC_URL environment variable is required"))?,
            submitter: Some(
                env::var("DESTINATION_SUBMITTER")
                    .map_err(|_| eyre!("DESTINATION_SUBMITTER environment variable is required"))?,
            ),
            native_decimals: env_or("DESTINATION_NATIVE_DECIMALS", default_native_decimals()),
            fee_params: FeeParams {
                gas_limit: env_or("DESTINATION_GAS_LIMIT", default_gas_limit()),
                gas_price: env_or("DESTINATION_GAS_PRICE", default_gas_price()),
            },
        };

        let assets = load_assets_from_env()?;

        let guard = GuardConfig {
            expiry: Duration::from_secs(env_or("GUARD_EXPIRY_SECS", default_guard_expiry_secs())),
        };

        let monitor = MonitorSettings {
            poll_interval: Duration::from_millis(env_or(
                "MONITOR_POLL_INTERVAL_MS",
                default_poll_interval_ms(),
            )),
            max_attempts: env_or("MONITOR_MAX_ATTEMPTS", default_max_attempts()),
            scan_chunk: env_or("MONITOR_SCAN_CHUNK", default_scan_chunk()),
        };

        let rpc = RpcSettings {
            retry_budget: env_or("RPC_RETRY_BUDGET", default_retry_budget()),
            initial_backoff: Duration::from_millis(env_or(
                "RPC_INITIAL_BACKOFF_MS",
                default_initial_backoff_ms(),
            )),
        };

        let config = Config {
            receiving_wallet,
            source,
            destination,
            assets,
            guard,
            monitor,
            rpc,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| default_bind_addr()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_hex_address(&self.receiving_wallet) {
            return Err(eyre!(
                "RECEIVING_WALLET must be a valid hex address (42 chars with 0x prefix)"
            ));
        }

        if self.source.rpc_url.is_empty() {
            return Err(eyre!("source rpc_url cannot be empty"));
        }
        if self.destination.rpc_url.is_empty() {
            return Err(eyre!("destination rpc_url cannot be empty"));
        }

        match &self.destination.submitter {
            Some(submitter) if is_hex_address(submitter) => {}
            Some(_) => {
                return Err(eyre!(
                    "DESTINATION_SUBMITTER must be a valid hex address (42 chars with 0x prefix)"
                ))
            }
            None => return Err(eyre!("destination endpoint needs a submission account")),
        }

        if self.assets.is_empty() {
            return Err(eyre!("at least one asset must be configured (ASSET_COUNT)"));
        }
        for asset in &self.assets {
            asset.validate().map_err(|e| eyre!(e))?;
            if asset.source_decimals > MAX_PRECISION {
                return Err(eyre!(
                    "asset {}: source decimals {} exceed the supported maximum {}",
                    asset.symbol,
                    asset.source_decimals,
                    MAX_PRECISION
                ));
            }
        }

        if self.monitor.max_attempts == 0 {
            return Err(eyre!("MONITOR_MAX_ATTEMPTS must be at least 1"));
        }
        if self.monitor.scan_chunk == 0 {
            return Err(eyre!("MONITOR_SCAN_CHUNK must be at least 1"));
        }

        Ok(())
    }
}

/// Load asset descriptors from `ASSET_COUNT` + `ASSET_{i}_*` variables.
fn load_assets_from_env() -> Result<Vec<AssetDescriptor>> {
    let count: usize = env::var("ASSET_COUNT")
        .map_err(|_| eyre!("ASSET_COUNT environment variable is required"))?
        .parse()
        .wrap_err("ASSET_COUNT must be a number")?;

    let mut assets = Vec::with_capacity(count);
    for i in 1..=count {
        let prefix = format!("ASSET_{}", i);

        let symbol = env::var(format!("{}_SYMBOL", prefix))
            .map_err(|_| eyre!("Missing {}_SYMBOL", prefix))?;

        let source_contract = env::var(format!("{}_SOURCE_CONTRACT", prefix))
            .unwrap_or_else(|_| NATIVE_MARKER.to_string());

        let destination_contract = env::var(format!("{}_DEST_CONTRACT", prefix)).ok();

        let source_decimals: u32 = env::var(format!("{}_DECIMALS", prefix))
            .map_err(|_| eyre!("Missing {}_DECIMALS", prefix))?
            .parse()
            .map_err(|_| eyre!("Invalid {}_DECIMALS", prefix))?;

        let native_on_destination: bool = env::var(format!("{}_NATIVE_ON_DEST", prefix))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(destination_contract.is_none());

        assets.push(AssetDescriptor {
            symbol,
            source_contract,
            destination_contract,
            source_decimals,
            native_on_destination,
        });
    }

    Ok(assets)
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn is_hex_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}
