//! Network profile registry.
//!
//! Each supported network carries the oracle parameters the random SVG
//! contract is deployed with: the VRF coordinator, the LINK token used to pay
//! the oracle fee, the key hash identifying the oracle's proving key and the
//! fee itself. Simulated networks leave the addresses empty and resolve them
//! from local deployment records instead.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Oracle parameters for one network.
///
/// # Fields
///
/// * `name` - Display name, also used for verification hints
/// * `vrf_coordinator` - Oracle coordinator address (live networks)
/// * `link_token` - Payment token address (live networks)
/// * `key_hash` - Randomness key identifier
/// * `fee` - Oracle fee in payment-token base units
/// * `simulated` - Whether the oracle is a locally deployed mock
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkProfile {
	pub name: String,
	#[serde(default)]
	pub vrf_coordinator: Option<Address>,
	#[serde(default)]
	pub link_token: Option<Address>,
	pub key_hash: B256,
	#[serde(deserialize_with = "deserialize_u256")]
	pub fee: U256,
	#[serde(default)]
	pub simulated: bool,
}

/// Network profiles keyed by chain id.
pub type NetworksConfig = HashMap<u64, NetworkProfile>;

/// Deserializes the network table, whose keys arrive as strings because TOML
/// tables cannot have integer keys.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkProfile> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, value)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, value))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

/// Deserializes a token amount written either as a decimal string
/// (`"1000000000000000000"`), a `0x` hex string or a TOML integer.
pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Amount {
		Text(String),
		Number(u64),
	}

	match Amount::deserialize(deserializer)? {
		Amount::Text(text) => text
			.trim()
			.parse::<U256>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid amount '{}': {}", text, e))),
		Amount::Number(value) => Ok(U256::from(value)),
	}
}
