//! Transaction types for chain interactions.
//!
//! These types are the boundary between the minter and whatever client talks
//! to the chain. They deliberately avoid RPC-specific shapes so that the
//! orchestrator can be driven by a simulated chain in tests.

use alloy_primitives::{Address, Bytes, Log, B256, U256};

/// A transaction to be signed and submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
	/// Target contract, or `None` for contract creation.
	pub to: Option<Address>,
	/// ABI-encoded call data or init code.
	pub data: Bytes,
	/// Native value attached to the call.
	pub value: U256,
	/// Explicit gas limit; estimated by the client when absent.
	pub gas_limit: Option<u64>,
}

impl Transaction {
	/// Creates a call to `to` with the given data.
	pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to: Some(to),
			data: data.into(),
			..Default::default()
		}
	}

	/// Creates a contract-creation transaction.
	pub fn create(init_code: impl Into<Bytes>) -> Self {
		Self {
			to: None,
			data: init_code.into(),
			..Default::default()
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
		self.gas_limit = gas_limit;
		self
	}
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: B256,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Address of the created contract, for creation transactions.
	pub contract_address: Option<Address>,
	/// Logs emitted during execution, in emission order.
	pub logs: Vec<Log>,
}

/// Filter for historical event logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
	/// Contract that emitted the logs.
	pub address: Address,
	/// Event signature hash (topic 0).
	pub event_signature: B256,
	/// First block to search, inclusive.
	pub from_block: u64,
	/// Optional constraint on the first indexed argument (topic 1).
	pub topic1: Option<B256>,
}

impl LogQuery {
	pub fn new(address: Address, event_signature: B256, from_block: u64) -> Self {
		Self {
			address,
			event_signature,
			from_block,
			topic1: None,
		}
	}

	pub fn with_topic1(mut self, topic: B256) -> Self {
		self.topic1 = Some(topic);
		self
	}

	/// Whether a log satisfies the address and topic constraints.
	///
	/// Block bounds are not checked since logs carry no block number.
	pub fn matches(&self, log: &Log) -> bool {
		let topics = log.topics();
		log.address == self.address
			&& topics.first() == Some(&self.event_signature)
			&& self
				.topic1
				.map_or(true, |topic| topics.get(1) == Some(&topic))
	}
}
