//! Decoding of the commit event from a `create()` receipt.

use crate::MintError;
use alloy_sol_types::SolEvent;
use mint_gateway::contracts::IRandomSVG;
use mint_types::{Address, TransactionReceipt, B256, U256};

/// Fields the mint contract reports when a token is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitEvent {
	pub request_id: B256,
	pub token_id: U256,
}

/// Known layouts of the commit event.
///
/// The layout is pinned in configuration so that a contract upgrade that
/// changes the event is caught at decode time rather than silently reading
/// the wrong fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitEventLayout {
	/// `requestedRandomSVG(bytes32 indexed requestId, uint256 indexed tokenId)`
	V1,
}

impl CommitEventLayout {
	pub fn from_version(version: u32) -> Option<Self> {
		match version {
			1 => Some(Self::V1),
			_ => None,
		}
	}

	pub fn version(&self) -> u32 {
		match self {
			Self::V1 => 1,
		}
	}

	pub fn event_signature(&self) -> B256 {
		match self {
			Self::V1 => IRandomSVG::requestedRandomSVG::SIGNATURE_HASH,
		}
	}

	/// Extracts the single commit event `contract` emitted in `receipt`.
	pub fn decode(
		&self,
		receipt: &TransactionReceipt,
		contract: Address,
	) -> Result<CommitEvent, MintError> {
		let signature = self.event_signature();
		let mut matching = receipt
			.logs
			.iter()
			.filter(|log| log.address == contract && log.topics().first() == Some(&signature));

		let log = matching.next().ok_or_else(|| {
			MintError::MalformedReceipt(format!(
				"transaction {} has no requestedRandomSVG event from {}",
				receipt.hash, contract
			))
		})?;
		if matching.next().is_some() {
			return Err(MintError::MalformedReceipt(format!(
				"transaction {} has more than one requestedRandomSVG event",
				receipt.hash
			)));
		}

		match self {
			Self::V1 => {
				let event = IRandomSVG::requestedRandomSVG::decode_log(log, true).map_err(|e| {
					MintError::MalformedReceipt(format!(
						"cannot decode requestedRandomSVG in {}: {}",
						receipt.hash, e
					))
				})?;
				Ok(CommitEvent {
					request_id: event.requestId,
					token_id: event.tokenId,
				})
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Bytes, Log, LogData};

	fn receipt(logs: Vec<Log>) -> TransactionReceipt {
		TransactionReceipt {
			hash: B256::repeat_byte(0x01),
			block_number: 5,
			success: true,
			contract_address: None,
			logs,
		}
	}

	fn commit_log(contract: Address, request_id: B256, token_id: U256) -> Log {
		Log {
			address: contract,
			data: IRandomSVG::requestedRandomSVG {
				requestId: request_id,
				tokenId: token_id,
			}
			.encode_log_data(),
		}
	}

	#[test]
	fn test_decodes_event_regardless_of_position() {
		let contract = Address::repeat_byte(0x5f);
		let noise = Log {
			address: Address::repeat_byte(0x01),
			data: LogData::new_unchecked(vec![B256::repeat_byte(0x09)], Bytes::new()),
		};
		let receipt = receipt(vec![
			noise.clone(),
			noise.clone(),
			noise,
			commit_log(contract, B256::repeat_byte(0x77), U256::from(4)),
		]);

		let event = CommitEventLayout::V1.decode(&receipt, contract).unwrap();
		assert_eq!(event.request_id, B256::repeat_byte(0x77));
		assert_eq!(event.token_id, U256::from(4));
	}

	#[test]
	fn test_missing_event() {
		let contract = Address::repeat_byte(0x5f);
		// right event, wrong emitter
		let receipt = receipt(vec![commit_log(
			Address::repeat_byte(0x01),
			B256::ZERO,
			U256::ZERO,
		)]);

		assert!(matches!(
			CommitEventLayout::V1.decode(&receipt, contract),
			Err(MintError::MalformedReceipt(_))
		));
	}

	#[test]
	fn test_duplicate_event() {
		let contract = Address::repeat_byte(0x5f);
		let receipt = receipt(vec![
			commit_log(contract, B256::ZERO, U256::ZERO),
			commit_log(contract, B256::ZERO, U256::from(1)),
		]);

		assert!(matches!(
			CommitEventLayout::V1.decode(&receipt, contract),
			Err(MintError::MalformedReceipt(_))
		));
	}

	#[test]
	fn test_truncated_topics_rejected() {
		let contract = Address::repeat_byte(0x5f);
		let receipt = receipt(vec![Log {
			address: contract,
			data: LogData::new_unchecked(
				vec![IRandomSVG::requestedRandomSVG::SIGNATURE_HASH],
				Bytes::new(),
			),
		}]);

		assert!(matches!(
			CommitEventLayout::V1.decode(&receipt, contract),
			Err(MintError::MalformedReceipt(_))
		));
	}

	#[test]
	fn test_versions() {
		assert_eq!(CommitEventLayout::from_version(1), Some(CommitEventLayout::V1));
		assert_eq!(CommitEventLayout::from_version(2), None);
		assert_eq!(CommitEventLayout::V1.version(), 1);
	}
}
