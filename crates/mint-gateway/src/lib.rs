//! Contract gateway for the random SVG minter.
//!
//! The gateway is the only place the minter touches the chain. It resolves
//! named deployments, deploys contracts from compiled artifacts, submits
//! transactions through a [`ChainClient`] and polls for their confirmation.
//! Typed wrappers for the mint contract, the oracle coordinator and the fee
//! token live in [`contracts`].

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use mint_types::{truncate_id, LogQuery, Transaction, TransactionReceipt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};

pub mod contracts;
pub mod deployments;
#[cfg(feature = "testing")]
pub mod testing;

/// Re-export implementations
pub mod implementations {
	pub mod alloy;
}

pub use deployments::{ArtifactStore, Deployment, Deployments};

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// No deployment record exists for the named contract.
	#[error("Contract '{0}' is not deployed")]
	NotDeployed(String),
	/// A call or transaction reverted.
	#[error("Reverted: {0}")]
	Reverted(String),
	/// A submitted transaction did not confirm in time.
	#[error("Timed out waiting for transaction {hash} after {waited:?}")]
	Timeout { hash: B256, waited: Duration },
	/// Return data or logs could not be decoded.
	#[error("Decode error: {0}")]
	Decode(String),
	/// A compiled artifact is missing or unusable.
	#[error("Artifact error: {0}")]
	Artifact(String),
	/// A deployment record could not be read or written.
	#[error("Deployment record error: {0}")]
	Record(String),
}

/// Low-level access to a single chain on behalf of one signer.
///
/// Implementations must not retry submissions: a resubmitted commit could
/// reserve a second token. The gateway never calls `submit` concurrently, so
/// an implementation may derive the nonce from the node's pending count.
#[async_trait]
pub trait ChainClient: Send + Sync {
	/// Chain id the client is connected to.
	fn chain_id(&self) -> u64;

	/// Address transactions are signed with.
	fn signer_address(&self) -> Address;

	/// Signs and broadcasts a transaction, returning its hash.
	async fn submit(&self, tx: Transaction) -> Result<B256, GatewayError>;

	/// Returns the receipt if the transaction has been mined.
	async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, GatewayError>;

	/// Executes a read-only call against the latest block.
	async fn call(&self, tx: Transaction) -> Result<Bytes, GatewayError>;

	async fn get_block_number(&self) -> Result<u64, GatewayError>;

	/// Fetches historical logs matching the query.
	async fn get_logs(&self, query: &LogQuery) -> Result<Vec<alloy_primitives::Log>, GatewayError>;
}

/// How long and how often to poll for a transaction receipt.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationSettings {
	/// Blocks required, counting the inclusion block.
	pub confirmations: u64,
	pub timeout: Duration,
	pub poll_interval: Duration,
}

impl Default for ConfirmationSettings {
	fn default() -> Self {
		Self {
			confirmations: 1,
			timeout: Duration::from_secs(300),
			poll_interval: Duration::from_secs(2),
		}
	}
}

struct GatewayInner {
	client: Arc<dyn ChainClient>,
	deployments: Deployments,
	artifacts: ArtifactStore,
	settings: ConfirmationSettings,
	/// Bounds the number of transactions awaiting confirmation at once.
	in_flight: Semaphore,
	/// Held while a transaction is signed and broadcast so that nonces are
	/// assigned one submission at a time.
	submitting: Mutex<()>,
}

/// Shared handle to the chain for one signer and one network.
///
/// Cloning is cheap; clones share the client, the deployment records and
/// the in-flight limit.
#[derive(Clone)]
pub struct ContractGateway {
	inner: Arc<GatewayInner>,
}

impl ContractGateway {
	pub fn new(
		client: Arc<dyn ChainClient>,
		deployments: Deployments,
		artifacts: ArtifactStore,
		settings: ConfirmationSettings,
		max_in_flight: usize,
	) -> Self {
		Self {
			inner: Arc::new(GatewayInner {
				client,
				deployments,
				artifacts,
				settings,
				in_flight: Semaphore::new(max_in_flight.max(1)),
				submitting: Mutex::new(()),
			}),
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.inner.client.chain_id()
	}

	/// Address of the signing account.
	pub fn signer(&self) -> Address {
		self.inner.client.signer_address()
	}

	/// Looks up the recorded deployment of `name`.
	pub async fn get(&self, name: &str) -> Result<Deployment, GatewayError> {
		self.inner.deployments.get(name).await
	}

	/// Binds a handle to a deployed contract using the gateway's signer.
	pub fn attach(&self, name: &str, address: Address) -> ContractHandle {
		ContractHandle {
			name: name.to_string(),
			address,
			gateway: self.clone(),
		}
	}

	/// Resolves the deployment of `name` and attaches to it.
	pub async fn attach_deployed(&self, name: &str) -> Result<ContractHandle, GatewayError> {
		let deployment = self.get(name).await?;
		Ok(self.attach(name, deployment.address))
	}

	/// Deploys `name` from its compiled artifact and records the deployment.
	///
	/// `constructor_args` must already be ABI-encoded; they are appended to
	/// the artifact bytecode.
	#[tracing::instrument(skip(self, constructor_args), fields(chain_id = self.chain_id()))]
	pub async fn deploy(
		&self,
		name: &str,
		constructor_args: &[u8],
	) -> Result<Deployment, GatewayError> {
		let bytecode = self.inner.artifacts.bytecode(name).await?;
		let mut init_code = bytecode.to_vec();
		init_code.extend_from_slice(constructor_args);

		let receipt = self.send(Transaction::create(init_code)).await?;
		if !receipt.success {
			return Err(GatewayError::Reverted(format!(
				"Deployment of {} reverted in transaction {}",
				name, receipt.hash
			)));
		}
		let address = receipt.contract_address.ok_or_else(|| {
			GatewayError::Decode(format!(
				"Receipt of {} deployment carries no contract address",
				name
			))
		})?;

		let deployment = Deployment {
			address,
			transaction_hash: Some(receipt.hash),
			encoded_args: Bytes::copy_from_slice(constructor_args),
		};
		self.inner.deployments.save(name, &deployment).await?;

		tracing::info!(contract = name, address = %address, "Deployed contract");
		Ok(deployment)
	}

	/// Submits a transaction and waits for it to confirm.
	///
	/// Reverted transactions still return their receipt; callers decide what
	/// a revert means.
	pub async fn send(&self, tx: Transaction) -> Result<TransactionReceipt, GatewayError> {
		let _permit = self
			.inner
			.in_flight
			.acquire()
			.await
			.map_err(|e| GatewayError::Network(format!("Submission queue closed: {}", e)))?;

		let hash = {
			let _submitting = self.inner.submitting.lock().await;
			self.inner.client.submit(tx).await?
		};
		tracing::debug!(tx_hash = %truncate_id(&hash.to_string()), "Submitted transaction");

		self.wait_for_confirmation(hash).await
	}

	/// Polls until the transaction has the configured confirmations.
	pub async fn wait_for_confirmation(
		&self,
		hash: B256,
	) -> Result<TransactionReceipt, GatewayError> {
		let settings = self.inner.settings;
		let start = tokio::time::Instant::now();

		loop {
			if start.elapsed() >= settings.timeout {
				return Err(GatewayError::Timeout {
					hash,
					waited: start.elapsed(),
				});
			}

			match self.inner.client.get_receipt(hash).await {
				Ok(Some(receipt)) => {
					let current = self.inner.client.get_block_number().await?;
					let confirmations = current.saturating_sub(receipt.block_number) + 1;
					if confirmations >= settings.confirmations {
						tracing::debug!(
							tx_hash = %truncate_id(&hash.to_string()),
							block = receipt.block_number,
							success = receipt.success,
							"Transaction confirmed"
						);
						return Ok(receipt);
					}
				},
				Ok(None) => {},
				Err(e) => {
					tracing::warn!(error = %e, "Failed to fetch receipt, will retry");
				},
			}

			tokio::time::sleep(settings.poll_interval).await;
		}
	}

	/// Executes a read-only call.
	pub async fn call(&self, tx: Transaction) -> Result<Bytes, GatewayError> {
		self.inner.client.call(tx).await
	}

	pub async fn get_logs(
		&self,
		query: &LogQuery,
	) -> Result<Vec<alloy_primitives::Log>, GatewayError> {
		self.inner.client.get_logs(query).await
	}

	pub async fn get_block_number(&self) -> Result<u64, GatewayError> {
		self.inner.client.get_block_number().await
	}
}

/// A named contract bound to the gateway's signer.
#[derive(Clone)]
pub struct ContractHandle {
	name: String,
	address: Address,
	gateway: ContractGateway,
}

impl ContractHandle {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn gateway(&self) -> &ContractGateway {
		&self.gateway
	}

	/// Sends `call` to the contract and waits for its receipt.
	pub async fn transact<C>(
		&self,
		call: &C,
		value: U256,
		gas_limit: Option<u64>,
	) -> Result<TransactionReceipt, GatewayError>
	where
		C: SolCall + Sync,
	{
		let tx = Transaction::call(self.address, call.abi_encode())
			.with_value(value)
			.with_gas_limit(gas_limit);
		tracing::debug!(contract = %self.name, function = C::SIGNATURE, "Sending transaction");
		self.gateway.send(tx).await
	}

	/// Performs a read-only call and decodes its return values.
	pub async fn read<C>(&self, call: &C) -> Result<C::Return, GatewayError>
	where
		C: SolCall + Sync,
	{
		let data = self
			.gateway
			.call(Transaction::call(self.address, call.abi_encode()))
			.await?;
		C::abi_decode_returns(&data, true).map_err(|e| {
			GatewayError::Decode(format!(
				"Failed to decode {} return from {}: {}",
				C::SIGNATURE,
				self.name,
				e
			))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU64, Ordering};

	/// Mines the receipt at block 10 and advances the head by one per poll.
	struct SlowChain {
		mined: bool,
		head: AtomicU64,
	}

	#[async_trait]
	impl ChainClient for SlowChain {
		fn chain_id(&self) -> u64 {
			31337
		}

		fn signer_address(&self) -> Address {
			Address::ZERO
		}

		async fn submit(&self, _tx: Transaction) -> Result<B256, GatewayError> {
			Ok(B256::repeat_byte(1))
		}

		async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
			Ok(self.mined.then(|| TransactionReceipt {
				hash,
				block_number: 10,
				success: true,
				contract_address: None,
				logs: Vec::new(),
			}))
		}

		async fn call(&self, _tx: Transaction) -> Result<Bytes, GatewayError> {
			Ok(Bytes::new())
		}

		async fn get_block_number(&self) -> Result<u64, GatewayError> {
			Ok(self.head.fetch_add(1, Ordering::SeqCst))
		}

		async fn get_logs(
			&self,
			_query: &LogQuery,
		) -> Result<Vec<alloy_primitives::Log>, GatewayError> {
			Ok(Vec::new())
		}
	}

	fn slow_gateway(
		dir: &tempfile::TempDir,
		mined: bool,
		confirmations: u64,
	) -> (ContractGateway, Arc<SlowChain>) {
		let chain = Arc::new(SlowChain {
			mined,
			head: AtomicU64::new(10),
		});
		let gateway = ContractGateway::new(
			chain.clone(),
			Deployments::new(dir.path().join("deployments")),
			ArtifactStore::new(dir.path().join("artifacts")),
			ConfirmationSettings {
				confirmations,
				timeout: Duration::from_secs(30),
				poll_interval: Duration::from_secs(1),
			},
			1,
		);
		(gateway, chain)
	}

	#[tokio::test(start_paused = true)]
	async fn test_inclusion_block_counts_as_confirmation() {
		let dir = tempfile::tempdir().unwrap();
		let (gateway, chain) = slow_gateway(&dir, true, 1);

		let receipt = gateway.send(Transaction::default()).await.unwrap();

		assert_eq!(receipt.block_number, 10);
		assert_eq!(chain.head.load(Ordering::SeqCst), 11);
	}

	#[tokio::test(start_paused = true)]
	async fn test_waits_for_confirmations() {
		let dir = tempfile::tempdir().unwrap();
		let (gateway, chain) = slow_gateway(&dir, true, 3);

		gateway.send(Transaction::default()).await.unwrap();

		// heads 10, 11 and 12 were observed before the third confirmation
		assert_eq!(chain.head.load(Ordering::SeqCst), 13);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unmined_transaction_times_out() {
		let dir = tempfile::tempdir().unwrap();
		let (gateway, _) = slow_gateway(&dir, false, 1);

		let result = gateway.send(Transaction::default()).await;

		match result {
			Err(GatewayError::Timeout { hash, waited }) => {
				assert_eq!(hash, B256::repeat_byte(1));
				assert!(waited >= Duration::from_secs(30));
			},
			other => panic!("expected timeout, got {:?}", other.map(|r| r.hash)),
		}
	}

	#[tokio::test]
	async fn test_attach_deployed_requires_record() {
		let dir = tempfile::tempdir().unwrap();
		let (gateway, _) = slow_gateway(&dir, true, 1);

		assert!(matches!(
			gateway.attach_deployed("RandomSVG").await,
			Err(GatewayError::NotDeployed(_))
		));
		let handle = gateway.attach("RandomSVG", Address::repeat_byte(7));
		assert_eq!(handle.address(), Address::repeat_byte(7));
		assert_eq!(handle.name(), "RandomSVG");
	}

	/// Derives the nonce from the number of accepted transactions, the way a
	/// node's pending transaction count does, and rejects reused nonces.
	struct PendingCountChain {
		accepted: AtomicU64,
	}

	#[async_trait]
	impl ChainClient for PendingCountChain {
		fn chain_id(&self) -> u64 {
			31337
		}

		fn signer_address(&self) -> Address {
			Address::ZERO
		}

		async fn submit(&self, _tx: Transaction) -> Result<B256, GatewayError> {
			let nonce = self.accepted.load(Ordering::SeqCst);
			// signing and broadcasting take a while
			tokio::time::sleep(Duration::from_millis(10)).await;
			self.accepted
				.compare_exchange(nonce, nonce + 1, Ordering::SeqCst, Ordering::SeqCst)
				.map_err(|_| GatewayError::Network(format!("nonce {} already used", nonce)))?;
			Ok(B256::with_last_byte(nonce as u8 + 1))
		}

		async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
			Ok(Some(TransactionReceipt {
				hash,
				block_number: 1,
				success: true,
				contract_address: None,
				logs: Vec::new(),
			}))
		}

		async fn call(&self, _tx: Transaction) -> Result<Bytes, GatewayError> {
			Ok(Bytes::new())
		}

		async fn get_block_number(&self) -> Result<u64, GatewayError> {
			Ok(1)
		}

		async fn get_logs(
			&self,
			_query: &LogQuery,
		) -> Result<Vec<alloy_primitives::Log>, GatewayError> {
			Ok(Vec::new())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_sends_get_distinct_nonces() {
		let dir = tempfile::tempdir().unwrap();
		let chain = Arc::new(PendingCountChain {
			accepted: AtomicU64::new(0),
		});
		let gateway = ContractGateway::new(
			chain.clone(),
			Deployments::new(dir.path().join("deployments")),
			ArtifactStore::new(dir.path().join("artifacts")),
			ConfirmationSettings::default(),
			4,
		);

		let (a, b, c, d) = tokio::join!(
			gateway.send(Transaction::default()),
			gateway.send(Transaction::default()),
			gateway.send(Transaction::default()),
			gateway.send(Transaction::default()),
		);

		let mut hashes = vec![
			a.unwrap().hash,
			b.unwrap().hash,
			c.unwrap().hash,
			d.unwrap().hash,
		];
		hashes.sort();
		hashes.dedup();
		assert_eq!(hashes.len(), 4);
		assert_eq!(chain.accepted.load(Ordering::SeqCst), 4);
	}
}
