//! Mint request lifecycle types.
//!
//! A mint moves through three states: the commit transaction has been mined
//! (`Committed`), the orchestrator is waiting on the oracle
//! (`AwaitingRandomness`), and the asset has been generated (`Finalized`).

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a mint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MintStatus {
	/// The commit transaction was mined and the request id extracted.
	Committed,
	/// Waiting for the oracle to deliver the random value.
	AwaitingRandomness,
	/// `finishMint` succeeded and the token URI is available.
	Finalized,
}

impl fmt::Display for MintStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MintStatus::Committed => write!(f, "committed"),
			MintStatus::AwaitingRandomness => write!(f, "awaiting-randomness"),
			MintStatus::Finalized => write!(f, "finalized"),
		}
	}
}

/// A single mint tracked from commit to finalized asset.
///
/// The request id is assigned by the oracle consumer contract during the
/// commit transaction, so a `MintRequest` only exists once the commit
/// receipt has been decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
	/// Token id reserved by the commit.
	pub token_id: U256,
	/// Oracle correlation key.
	pub request_id: B256,
	/// Current lifecycle status.
	pub status: MintStatus,
	/// Address of the mint contract that emitted the commit event.
	pub contract: Address,
	/// Hash of the commit transaction.
	pub commit_tx: B256,
	/// Block in which the commit transaction was mined.
	pub commit_block: u64,
	/// Random value delivered by the oracle, once observed.
	pub random_value: Option<U256>,
	/// Hash of the mined `finishMint` transaction. Once set the token is
	/// finished on-chain and only the URI remains to be read.
	#[serde(default)]
	pub finalize_tx: Option<B256>,
	/// Token URI read back after finalization.
	pub asset_locator: Option<AssetLocator>,
	/// Unix timestamp of creation.
	pub created_at: u64,
	/// Unix timestamp of the last update.
	pub updated_at: u64,
}

impl MintRequest {
	/// Storage id for this request.
	///
	/// Token ids are only unique per contract, so the id combines both.
	pub fn storage_id(&self) -> String {
		Self::storage_id_for(&self.contract, self.token_id)
	}

	/// Storage id for a contract/token pair.
	pub fn storage_id_for(contract: &Address, token_id: U256) -> String {
		format!("{:#x}-{}", contract, token_id)
	}

	/// Whether the oracle callback has been observed for this request.
	pub fn has_randomness(&self) -> bool {
		self.random_value.is_some()
	}
}

impl fmt::Display for MintRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"token {} (request {}, status {})",
			self.token_id, self.request_id, self.status
		)
	}
}

/// Random value delivered by the oracle for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleCallback {
	pub request_id: B256,
	pub random_value: U256,
	/// Contract that consumed the randomness.
	pub consumer: Address,
}

/// URI a client resolves to fetch a token's metadata and artwork.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetLocator(pub String);

impl AssetLocator {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for AssetLocator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for AssetLocator {
	fn from(value: String) -> Self {
		Self(value)
	}
}
