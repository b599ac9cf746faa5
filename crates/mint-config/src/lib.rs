//! Configuration module for the random SVG minter.
//!
//! Configuration is a single TOML file. String values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`, which keeps private
//! keys and RPC endpoints out of the file itself.

use mint_types::networks::{deserialize_networks, deserialize_u256};
use mint_types::{NetworkProfile, NetworksConfig, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Highest commit event layout version this build can decode.
pub const LATEST_COMMIT_EVENT_VERSION: u32 = 1;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Minting parameters.
	pub minter: MinterConfig,
	/// Network profiles keyed by chain id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Chain connection and confirmation settings.
	pub rpc: RpcConfig,
	/// Oracle waiting behaviour.
	#[serde(default)]
	pub oracle: OracleConfig,
	/// Signing account.
	pub account: AccountConfig,
	/// Persistence of mint requests.
	pub storage: StorageConfig,
	/// Deployment records and compiled artifacts.
	#[serde(default)]
	pub deployments: DeploymentsConfig,
}

/// Minting parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MinterConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Chain id of the network to mint on. Must exist in `networks`.
	pub network_id: u64,
	/// Native value sent with `create`.
	#[serde(
		default = "default_mint_value",
		deserialize_with = "deserialize_u256"
	)]
	pub mint_value: U256,
	/// Gas limit for `create`.
	#[serde(default = "default_create_gas_limit")]
	pub create_gas_limit: u64,
	/// Gas limit for `finishMint`, which renders the SVG on-chain.
	#[serde(default = "default_finalize_gas_limit")]
	pub finalize_gas_limit: u64,
}

/// 0.1 ETH, the contract's mint price.
fn default_mint_value() -> U256 {
	U256::from(100_000_000_000_000_000u64)
}

fn default_create_gas_limit() -> u64 {
	300_000
}

fn default_finalize_gas_limit() -> u64 {
	2_000_000
}

/// Chain connection and confirmation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
	/// HTTP(S) RPC endpoint.
	pub url: String,
	/// Blocks a transaction must be buried under before it counts as mined.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Upper bound on waiting for a single transaction's confirmations.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Interval between receipt polls.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Maximum number of state-changing transactions in flight at once.
	#[serde(default = "default_max_in_flight")]
	pub max_in_flight: usize,
}

fn default_confirmations() -> u64 {
	1
}

fn default_confirmation_timeout_seconds() -> u64 {
	300
}

fn default_poll_interval_ms() -> u64 {
	2_000
}

fn default_max_in_flight() -> usize {
	4
}

impl RpcConfig {
	pub fn confirmation_timeout(&self) -> Duration {
		Duration::from_secs(self.confirmation_timeout_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

/// Oracle waiting behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
	/// How long to wait for a live oracle callback before giving up.
	#[serde(default = "default_oracle_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Interval between callback polls in live mode.
	#[serde(default = "default_oracle_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	/// Random value injected through the mock coordinator on simulated networks.
	#[serde(
		default = "default_simulated_random_value",
		deserialize_with = "deserialize_u256"
	)]
	pub simulated_random_value: U256,
	/// Layout version of the commit event emitted by the mint contract.
	#[serde(default = "default_commit_event_version")]
	pub commit_event_version: u32,
}

impl Default for OracleConfig {
	fn default() -> Self {
		Self {
			timeout_seconds: default_oracle_timeout_seconds(),
			poll_interval_seconds: default_oracle_poll_interval_seconds(),
			simulated_random_value: default_simulated_random_value(),
			commit_event_version: default_commit_event_version(),
		}
	}
}

fn default_oracle_timeout_seconds() -> u64 {
	600
}

fn default_oracle_poll_interval_seconds() -> u64 {
	5
}

fn default_simulated_random_value() -> U256 {
	U256::from(77777)
}

fn default_commit_event_version() -> u32 {
	LATEST_COMMIT_EVENT_VERSION
}

impl OracleConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_seconds)
	}
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Where deployment records and compiled artifacts live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentsConfig {
	/// Directory of `<Name>.json` deployment records for this network.
	#[serde(default = "default_deployments_dir")]
	pub path: String,
	/// Directory of `<Name>.json` compiled artifacts carrying `bytecode`.
	#[serde(default = "default_artifacts_dir")]
	pub artifacts: String,
}

impl Default for DeploymentsConfig {
	fn default() -> Self {
		Self {
			path: default_deployments_dir(),
			artifacts: default_artifacts_dir(),
		}
	}
}

fn default_deployments_dir() -> String {
	"./deployments".to_string()
}

fn default_artifacts_dir() -> String {
	"./artifacts".to_string()
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with `default`
/// for `${VAR_NAME:-default}` when the variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Profile of the network selected by `minter.network_id`.
	///
	/// Validation guarantees the profile exists.
	pub fn active_network(&self) -> Result<&NetworkProfile, ConfigError> {
		self.networks.get(&self.minter.network_id).ok_or_else(|| {
			ConfigError::Validation(format!(
				"Network {} not found in networks configuration",
				self.minter.network_id
			))
		})
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.minter.id.is_empty() {
			return Err(ConfigError::Validation("Minter ID cannot be empty".into()));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.fee.is_zero() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have a non-zero oracle fee",
					chain_id
				)));
			}
			if !network.simulated
				&& (network.vrf_coordinator.is_none() || network.link_token.is_none())
			{
				return Err(ConfigError::Validation(format!(
					"Network {} is not simulated and must set vrf_coordinator and link_token",
					chain_id
				)));
			}
		}
		self.active_network()?;

		if self.rpc.url.is_empty() {
			return Err(ConfigError::Validation("RPC url cannot be empty".into()));
		}
		if self.rpc.confirmations == 0 {
			return Err(ConfigError::Validation(
				"confirmations must be at least 1".into(),
			));
		}
		if self.rpc.confirmations > 100 {
			return Err(ConfigError::Validation(
				"confirmations cannot exceed 100".into(),
			));
		}
		if self.rpc.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_ms must be greater than 0".into(),
			));
		}
		if self.rpc.max_in_flight == 0 {
			return Err(ConfigError::Validation(
				"max_in_flight must be at least 1".into(),
			));
		}

		if self.oracle.timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"Oracle timeout_seconds must be greater than 0".into(),
			));
		}
		if self.oracle.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Oracle poll_interval_seconds must be greater than 0".into(),
			));
		}
		if self.oracle.commit_event_version == 0
			|| self.oracle.commit_event_version > LATEST_COMMIT_EVENT_VERSION
		{
			return Err(ConfigError::Validation(format!(
				"Unsupported commit_event_version {} (latest is {})",
				self.oracle.commit_event_version, LATEST_COMMIT_EVENT_VERSION
			)));
		}

		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved first and the result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE: &str = r#"
[minter]
id = "random-svg"
network_id = 31337

[networks.31337]
name = "localhost"
key_hash = "0x2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311"
fee = "1000000000000000000"
simulated = true

[networks.4]
name = "rinkeby"
vrf_coordinator = "0xb3dCcb4Cf7a26f6cf6B120Cf5A73875B7BBc655B"
link_token = "0x01BE23585060835E02B77ef475b0Cc51aA1e0709"
key_hash = "0x2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311"
fee = "1000000000000000000"

[rpc]
url = "http://127.0.0.1:8545"

[account]
primary = "local"

[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[storage]
primary = "memory"

[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("MINT_TEST_RPC", "http://node:8545");
		let resolved = resolve_env_vars("url = \"${MINT_TEST_RPC}\"").unwrap();
		assert_eq!(resolved, "url = \"http://node:8545\"");
		std::env::remove_var("MINT_TEST_RPC");
	}

	#[test]
	fn test_env_var_with_default() {
		let resolved = resolve_env_vars("key = \"${MINT_TEST_UNSET_KEY:-fallback}\"").unwrap();
		assert_eq!(resolved, "key = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let err = resolve_env_vars("key = \"${MINT_TEST_DEFINITELY_MISSING}\"").unwrap_err();
		assert!(err.to_string().contains("MINT_TEST_DEFINITELY_MISSING"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE.parse().unwrap();
		assert_eq!(config.rpc.confirmations, 1);
		assert_eq!(config.minter.create_gas_limit, 300_000);
		assert_eq!(config.minter.finalize_gas_limit, 2_000_000);
		assert_eq!(
			config.minter.mint_value,
			U256::from(100_000_000_000_000_000u64)
		);
		assert_eq!(config.oracle.simulated_random_value, U256::from(77777));
		assert_eq!(config.oracle.commit_event_version, 1);
		assert_eq!(config.deployments.path, "./deployments");

		let active = config.active_network().unwrap();
		assert_eq!(active.name, "localhost");
		assert!(active.simulated);
	}

	#[test]
	fn test_unknown_network_rejected() {
		let toml = BASE.replace("network_id = 31337", "network_id = 1");
		let err = toml.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Network 1 not found"));
	}

	#[test]
	fn test_live_network_requires_addresses() {
		let toml = BASE.replace(
			"vrf_coordinator = \"0xb3dCcb4Cf7a26f6cf6B120Cf5A73875B7BBc655B\"\n",
			"",
		);
		let err = toml.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("must set vrf_coordinator"));
	}

	#[test]
	fn test_unsupported_event_version_rejected() {
		let toml = format!("{}\n[oracle]\ncommit_event_version = 2\n", BASE);
		let err = toml.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Unsupported commit_event_version 2"));
	}

	#[test]
	fn test_zero_confirmations_rejected() {
		let toml = BASE.replace(
			"url = \"http://127.0.0.1:8545\"",
			"url = \"http://127.0.0.1:8545\"\nconfirmations = 0",
		);
		let err = toml.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("confirmations must be at least 1"));
	}

	#[test]
	fn test_zero_poll_interval_rejected() {
		let toml = BASE.replace(
			"url = \"http://127.0.0.1:8545\"",
			"url = \"http://127.0.0.1:8545\"\npoll_interval_ms = 0",
		);
		let err = toml.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("poll_interval_ms must be greater than 0"));
	}

	#[test]
	fn test_shipped_configs_use_one_link_fee() {
		let one_link = U256::from(1_000_000_000_000_000_000u64);

		let localhost: Config = include_str!("../../../config/localhost.toml")
			.parse()
			.unwrap();
		assert_eq!(localhost.active_network().unwrap().fee, one_link);

		// rinkeby needs secrets from the environment, so only its table is read
		let rinkeby: toml::Value = toml::from_str(include_str!("../../../config/rinkeby.toml")).unwrap();
		assert_eq!(
			rinkeby["networks"]["4"]["fee"].as_str(),
			Some("1000000000000000000")
		);
	}

	#[tokio::test]
	async fn test_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("minter.toml");
		tokio::fs::write(&path, BASE).await.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(config.minter.id, "random-svg");
		assert_eq!(config.networks.len(), 2);
	}
}
