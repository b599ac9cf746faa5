//! Alloy-backed chain client.
//!
//! Submits transactions through an HTTP provider with the recommended
//! fillers and a local wallet. Reads are retried with exponential backoff
//! on transport failures; JSON-RPC error responses and submissions are never
//! retried.

use crate::{ChainClient, GatewayError};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, Log, B256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{Filter, TransactionRequest};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;
use alloy_transport_http::Http;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use mint_types::{truncate_id, LogQuery, SecretString, Transaction, TransactionReceipt};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Chain client for EVM networks reached over HTTP JSON-RPC.
pub struct AlloyClient {
	provider: HttpProvider,
	chain_id: u64,
	signer: Address,
	/// Upper bound on the time spent retrying a single read.
	max_retry_elapsed: Duration,
}

impl AlloyClient {
	/// Connects to `rpc_url`, signing for `chain_id` with `private_key`.
	pub fn new(
		rpc_url: &str,
		chain_id: u64,
		private_key: &SecretString,
		max_retry_elapsed: Duration,
	) -> Result<Self, GatewayError> {
		let url = rpc_url
			.parse()
			.map_err(|e| GatewayError::Network(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

		let signer: PrivateKeySigner = private_key.with_exposed(|key| {
			key.parse()
				.map_err(|e| GatewayError::Network(format!("Invalid signing key: {}", e)))
		})?;
		let signer = signer.with_chain_id(Some(chain_id));
		let address = signer.address();
		let wallet = EthereumWallet::from(signer);

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			provider: Arc::new(provider) as HttpProvider,
			chain_id,
			signer: address,
			max_retry_elapsed,
		})
	}

	/// Runs a read with exponential backoff on transport failures.
	async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, GatewayError>
	where
		F: Fn() -> Fut,
		Fut: IntoFuture<Output = Result<T, TransportError>>,
	{
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.max_retry_elapsed),
			..Default::default()
		};

		backoff::future::retry(policy, || {
			let fut = f().into_future();
			async move {
				fut.await.map_err(|e| {
					if e.is_error_resp() {
						backoff::Error::permanent(e)
					} else {
						tracing::debug!(operation, error = %e, "Transient RPC failure, retrying");
						backoff::Error::transient(e)
					}
				})
			}
		})
		.await
		.map_err(|e| map_rpc_error(operation, e))
	}
}

fn map_rpc_error(operation: &str, error: TransportError) -> GatewayError {
	match error.as_error_resp() {
		Some(payload) => GatewayError::Reverted(format!("{}: {}", operation, payload.message)),
		None => GatewayError::Network(format!("{} failed: {}", operation, error)),
	}
}

fn to_request(tx: Transaction) -> TransactionRequest {
	let mut request = TransactionRequest::default().with_value(tx.value);
	request = match tx.to {
		Some(to) => request.with_to(to).with_input(tx.data),
		None => request.with_deploy_code(tx.data),
	};
	if let Some(gas_limit) = tx.gas_limit {
		request = request.with_gas_limit(gas_limit);
	}
	request
}

#[async_trait]
impl ChainClient for AlloyClient {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	fn signer_address(&self) -> Address {
		self.signer
	}

	async fn submit(&self, tx: Transaction) -> Result<B256, GatewayError> {
		let pending = self
			.provider
			.send_transaction(to_request(tx))
			.await
			.map_err(|e| map_rpc_error("send_transaction", e))?;

		let hash = *pending.tx_hash();
		tracing::info!(
			tx_hash = %truncate_id(&hash.to_string()),
			chain_id = self.chain_id,
			"Submitted transaction"
		);
		Ok(hash)
	}

	async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
		let receipt = self
			.with_retry("get_transaction_receipt", || {
				self.provider.get_transaction_receipt(hash)
			})
			.await?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			hash: receipt.transaction_hash,
			block_number: receipt.block_number.unwrap_or_default(),
			success: receipt.status(),
			contract_address: receipt.contract_address,
			logs: receipt
				.inner
				.logs()
				.iter()
				.map(|log| log.inner.clone())
				.collect(),
		}))
	}

	async fn call(&self, tx: Transaction) -> Result<Bytes, GatewayError> {
		let request = to_request(tx);
		self.with_retry("eth_call", || self.provider.call(&request))
			.await
	}

	async fn get_block_number(&self) -> Result<u64, GatewayError> {
		self.with_retry("get_block_number", || self.provider.get_block_number())
			.await
	}

	async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>, GatewayError> {
		let mut filter = Filter::new()
			.address(query.address)
			.event_signature(query.event_signature)
			.from_block(query.from_block);
		if let Some(topic) = query.topic1 {
			filter = filter.topic1(topic);
		}

		let logs = self
			.with_retry("get_logs", || self.provider.get_logs(&filter))
			.await?;
		Ok(logs.into_iter().map(|log| log.inner).collect())
	}
}
