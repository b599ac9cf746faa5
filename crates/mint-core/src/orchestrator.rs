//! Commit, await the oracle callback, finalize.
//!
//! A mint starts with `create()`, which reserves a token id and asks the
//! oracle for randomness. Once the oracle has called back, `finishMint`
//! generates the artwork and `tokenURI` returns its locator. Every step is
//! persisted so that `resume` can pick an interrupted mint up where it
//! stopped.

use crate::environment::NetworkEnvironment;
use crate::randomness::{LiveSource, RandomnessSource, SimulatedSource};
use crate::receipt::CommitEventLayout;
use crate::state::{MintStateError, MintStateMachine};
use crate::{MintError, WorkflowFailure};
use mint_config::OracleConfig;
use mint_gateway::contracts::{RandomSvg, VrfCoordinatorMock};
use mint_gateway::ContractGateway;
use mint_storage::StorageService;
use mint_types::{
	current_timestamp, truncate_id, Address, AssetLocator, MintRequest, MintStatus,
	OracleCallback, U256,
};
use std::sync::Arc;
use tracing::instrument;

/// Value and gas settings for the mint transactions.
#[derive(Debug, Clone, Copy)]
pub struct MintSettings {
	/// Native value sent with `create()`.
	pub value: U256,
	pub create_gas_limit: u64,
	pub finalize_gas_limit: u64,
}

/// Drives mints against one deployed `RandomSVG` contract.
pub struct MintOrchestrator {
	contract: RandomSvg,
	state: MintStateMachine,
	randomness: Arc<dyn RandomnessSource>,
	layout: CommitEventLayout,
	settings: MintSettings,
}

impl MintOrchestrator {
	pub fn new(
		contract: RandomSvg,
		storage: Arc<StorageService>,
		randomness: Arc<dyn RandomnessSource>,
		layout: CommitEventLayout,
		settings: MintSettings,
	) -> Self {
		Self {
			contract,
			state: MintStateMachine::new(storage),
			randomness,
			layout,
			settings,
		}
	}

	/// Picks the randomness source matching the environment.
	pub fn randomness_source(
		gateway: &ContractGateway,
		environment: &NetworkEnvironment,
		oracle: &OracleConfig,
	) -> Arc<dyn RandomnessSource> {
		if environment.is_simulated() {
			Arc::new(SimulatedSource::new(
				VrfCoordinatorMock::new(
					gateway.attach(VrfCoordinatorMock::NAME, environment.vrf_coordinator),
				),
				oracle.simulated_random_value,
			))
		} else {
			Arc::new(LiveSource::new(
				gateway.clone(),
				environment.vrf_coordinator,
				oracle.timeout(),
				oracle.poll_interval(),
			))
		}
	}

	pub fn contract_address(&self) -> Address {
		self.contract.address()
	}

	/// Submits `create()` and records the reserved token.
	#[instrument(skip_all, fields(contract = %self.contract.address()))]
	pub async fn commit(&self, value: U256) -> Result<MintRequest, MintError> {
		let receipt = self
			.contract
			.create(value, Some(self.settings.create_gas_limit))
			.await
			.map_err(|e| MintError::CommitFailed(e.to_string()))?;
		if !receipt.success {
			return Err(MintError::CommitFailed(format!(
				"create() reverted in {}",
				receipt.hash
			)));
		}

		let event = self.layout.decode(&receipt, self.contract.address())?;
		let now = current_timestamp();
		let request = MintRequest {
			token_id: event.token_id,
			request_id: event.request_id,
			status: MintStatus::Committed,
			contract: self.contract.address(),
			commit_tx: receipt.hash,
			commit_block: receipt.block_number,
			random_value: None,
			finalize_tx: None,
			asset_locator: None,
			created_at: now,
			updated_at: now,
		};
		self.state.record(&request).await?;

		tracing::info!(
			token_id = %request.token_id,
			request_id = %truncate_id(&request.request_id.to_string()),
			"Committed mint"
		);
		Ok(request)
	}

	/// Waits for the oracle to deliver randomness for `request`.
	///
	/// If the value was already observed (on a resumed request) it is
	/// returned without contacting the oracle again.
	#[instrument(skip_all, fields(token_id = %request.token_id, request_id = %truncate_id(&request.request_id.to_string())))]
	pub async fn await_callback(&self, request: &MintRequest) -> Result<OracleCallback, MintError> {
		let id = request.storage_id();
		let current = self.state.load(&request.contract, request.token_id).await?;
		if let Some(random_value) = current.random_value {
			return Ok(OracleCallback {
				request_id: current.request_id,
				random_value,
				consumer: current.contract,
			});
		}

		let awaiting = match current.status {
			MintStatus::Committed => {
				self.state
					.transition(&id, MintStatus::AwaitingRandomness)
					.await?
			},
			MintStatus::AwaitingRandomness => current,
			MintStatus::Finalized => {
				return Err(MintStateError::InvalidTransition {
					from: MintStatus::Finalized,
					to: MintStatus::AwaitingRandomness,
				}
				.into())
			},
		};

		let callback = self.randomness.await_randomness(&awaiting).await?;
		if callback.request_id != awaiting.request_id || callback.consumer != awaiting.contract {
			return Err(MintError::CallbackRejected(format!(
				"callback for request {} on {} does not match request {}",
				callback.request_id, callback.consumer, awaiting.request_id
			)));
		}

		self.state.record_randomness(&id, callback.random_value).await?;
		tracing::info!(random_value = %callback.random_value, "Received randomness");
		Ok(callback)
	}

	/// Submits `finishMint(token_id)` and reads back the token URI.
	///
	/// `finishMint` is sent at most once per persisted request: the mined
	/// transaction is recorded before the URI is read, and a request that
	/// already carries one only repeats the read. A revert is never retried
	/// since it means the token is not ready or is already finished.
	#[instrument(skip_all, fields(token_id = %token_id))]
	pub async fn finalize(&self, token_id: U256) -> Result<AssetLocator, MintError> {
		let contract = self.contract.address();
		let id = MintRequest::storage_id_for(&contract, token_id);
		let current = match self.state.load(&contract, token_id).await {
			Ok(request) => Some(request),
			Err(MintStateError::NotFound(_)) => None,
			Err(e) => return Err(e.into()),
		};
		if let Some(request) = current.as_ref().filter(|r| r.status == MintStatus::Finalized) {
			return Err(MintError::FinalizeFailed(format!(
				"token {} is already finalized with {}",
				token_id,
				truncate_id(request.asset_locator.as_ref().map_or("", |l| l.as_str()))
			)));
		}

		match current.as_ref().and_then(|r| r.finalize_tx) {
			Some(tx_hash) => {
				tracing::info!(
					tx_hash = %truncate_id(&tx_hash.to_string()),
					"finishMint already mined, reading token URI"
				);
			},
			None => {
				let receipt = self
					.contract
					.finish_mint(token_id, Some(self.settings.finalize_gas_limit))
					.await
					.map_err(|e| MintError::FinalizeFailed(e.to_string()))?;
				if !receipt.success {
					return Err(MintError::FinalizeFailed(format!(
						"finishMint({}) reverted in {}",
						token_id, receipt.hash
					)));
				}

				if let Some(request) = &current {
					// The oracle may have called back without this process observing it.
					if request.status == MintStatus::Committed {
						self.state
							.transition(&id, MintStatus::AwaitingRandomness)
							.await?;
					}
					self.state.record_finalize_tx(&id, receipt.hash).await?;
				}
			},
		}

		let uri = self
			.contract
			.token_uri(token_id)
			.await
			.map_err(|e| MintError::FinalizeFailed(format!("tokenURI({}): {}", token_id, e)))?;
		if uri.is_empty() {
			return Err(MintError::FinalizeFailed(format!(
				"tokenURI({}) is empty after finishMint",
				token_id
			)));
		}
		let locator = AssetLocator::from(uri);

		if current.is_some() {
			self.state.finalize(&id, locator.clone()).await?;
		}

		tracing::info!(locator = %truncate_id(locator.as_str()), "Finalized mint");
		Ok(locator)
	}

	/// Runs a complete mint: commit, await the callback, finalize.
	pub async fn run(&self) -> Result<MintRequest, WorkflowFailure> {
		let request = self
			.commit(self.settings.value)
			.await
			.map_err(|e| WorkflowFailure::new(None, e))?;
		self.drive(request).await
	}

	/// Continues a persisted mint from its last recorded state.
	pub async fn resume(&self, token_id: U256) -> Result<MintRequest, WorkflowFailure> {
		let request = self
			.state
			.load(&self.contract.address(), token_id)
			.await
			.map_err(|e| WorkflowFailure::new(None, e.into()))?;
		tracing::info!(token_id = %token_id, status = %request.status, "Resuming mint");
		self.drive(request).await
	}

	/// Persisted mints on this contract that have not been finalized.
	pub async fn pending(&self) -> Result<Vec<MintRequest>, MintError> {
		Ok(self.state.pending(Some(self.contract.address())).await?)
	}

	async fn drive(&self, request: MintRequest) -> Result<MintRequest, WorkflowFailure> {
		if request.status == MintStatus::Finalized {
			return Ok(request);
		}

		if !request.has_randomness() && request.finalize_tx.is_none() {
			if let Err(e) = self.await_callback(&request).await {
				return Err(self.abort(request, e).await);
			}
		}
		if let Err(e) = self.finalize(request.token_id).await {
			return Err(self.abort(request, e).await);
		}

		self.state
			.load(&request.contract, request.token_id)
			.await
			.map_err(|e| WorkflowFailure::new(Some(request), e.into()))
	}

	/// Builds the failure report from the latest persisted state.
	async fn abort(&self, request: MintRequest, error: MintError) -> WorkflowFailure {
		let latest = self
			.state
			.load(&request.contract, request.token_id)
			.await
			.unwrap_or(request);
		tracing::error!(
			token_id = %latest.token_id,
			request_id = %truncate_id(&latest.request_id.to_string()),
			status = %latest.status,
			error = %error,
			"Mint aborted"
		);
		WorkflowFailure::new(Some(latest), error)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::LocalStack;
	use async_trait::async_trait;
	use mint_gateway::contracts::IRandomSVG;
	use mint_gateway::testing::SimulatedChain;
	use mint_gateway::{
		ArtifactStore, ChainClient, ConfirmationSettings, Deployments, GatewayError,
	};
	use mint_storage::implementations::file::FileStorage;
	use mint_types::{Bytes, LogQuery, Transaction, TransactionReceipt, B256};
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::time::Duration;

	/// Simulated chain whose next read-only call can be made to fail.
	struct FlakyReads {
		chain: Arc<SimulatedChain>,
		fail_next_call: AtomicBool,
		submitted: AtomicUsize,
	}

	#[async_trait]
	impl ChainClient for FlakyReads {
		fn chain_id(&self) -> u64 {
			self.chain.chain_id()
		}

		fn signer_address(&self) -> Address {
			self.chain.signer_address()
		}

		async fn submit(&self, tx: Transaction) -> Result<B256, GatewayError> {
			self.submitted.fetch_add(1, Ordering::SeqCst);
			self.chain.submit(tx).await
		}

		async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
			self.chain.get_receipt(hash).await
		}

		async fn call(&self, tx: Transaction) -> Result<Bytes, GatewayError> {
			if self.fail_next_call.swap(false, Ordering::SeqCst) {
				return Err(GatewayError::Network("connection reset".into()));
			}
			self.chain.call(tx).await
		}

		async fn get_block_number(&self) -> Result<u64, GatewayError> {
			self.chain.get_block_number().await
		}

		async fn get_logs(
			&self,
			query: &LogQuery,
		) -> Result<Vec<alloy_primitives::Log>, GatewayError> {
			self.chain.get_logs(query).await
		}
	}

	#[tokio::test]
	async fn test_local_network_scenario() {
		let stack = LocalStack::new().await;
		let orchestrator = stack.orchestrator();

		let minted = orchestrator.run().await.unwrap();

		assert_eq!(minted.token_id, U256::ZERO);
		assert_eq!(minted.status, MintStatus::Finalized);
		assert_eq!(minted.random_value, Some(U256::from(77777)));
		let locator = minted.asset_locator.unwrap();
		assert!(!locator.is_empty());
		assert_eq!(stack.svg.token_uri(U256::ZERO).await.unwrap(), locator.as_str());
		assert!(orchestrator.pending().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_simulated_callback_matches_request() {
		let stack = LocalStack::new().await;
		let orchestrator = stack.orchestrator();

		let request = orchestrator.commit(LocalStack::settings().value).await.unwrap();
		assert_eq!(request.status, MintStatus::Committed);

		let callback = orchestrator.await_callback(&request).await.unwrap();
		assert_eq!(callback.request_id, request.request_id);
		assert_eq!(callback.consumer, stack.svg.address());
		assert_eq!(callback.random_value, U256::from(77777));

		// a second wait reuses the observed value instead of calling back again
		let again = orchestrator.await_callback(&request).await.unwrap();
		assert_eq!(again, callback);

		let pending = orchestrator.pending().await.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].status, MintStatus::AwaitingRandomness);
		assert!(pending[0].has_randomness());
	}

	#[tokio::test]
	async fn test_finalize_before_callback_fails() {
		let stack = LocalStack::new().await;
		let orchestrator = stack.orchestrator();
		let request = orchestrator.commit(LocalStack::settings().value).await.unwrap();

		let result = orchestrator.finalize(request.token_id).await;

		assert!(matches!(result, Err(MintError::FinalizeFailed(_))));
		let stored = orchestrator.pending().await.unwrap();
		assert_eq!(stored[0].status, MintStatus::Committed);
		assert!(stored[0].asset_locator.is_none());
		assert!(stack.svg.token_uri(request.token_id).await.is_err());
	}

	#[tokio::test]
	async fn test_finalize_twice_keeps_locator() {
		let stack = LocalStack::new().await;
		let orchestrator = stack.orchestrator();
		let minted = orchestrator.run().await.unwrap();
		let locator = minted.asset_locator.clone().unwrap();

		let second = orchestrator.finalize(minted.token_id).await;

		assert!(matches!(second, Err(MintError::FinalizeFailed(_))));
		assert_eq!(
			stack.svg.token_uri(minted.token_id).await.unwrap(),
			locator.as_str()
		);
		let resumed = orchestrator.resume(minted.token_id).await.unwrap();
		assert_eq!(resumed.asset_locator, Some(locator));
	}

	#[tokio::test]
	async fn test_same_random_value_gives_same_locator() {
		let first = LocalStack::new().await;
		let second = LocalStack::new().await;

		let a = first.orchestrator().run().await.unwrap();
		let b = second.orchestrator().run().await.unwrap();

		assert_eq!(a.asset_locator, b.asset_locator);
	}

	#[tokio::test]
	async fn test_missing_commit_event_is_malformed() {
		let stack = LocalStack::new().await;
		stack.chain.drop_commit_events(true).unwrap();
		let orchestrator = stack.orchestrator();

		let failure = orchestrator.run().await.unwrap_err();

		assert!(failure.request.is_none());
		assert!(matches!(failure.error, MintError::MalformedReceipt(_)));
		assert!(orchestrator.pending().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_unfunded_commit_fails() {
		let stack = LocalStack::new().await;
		let unfunded = LocalStack::deploy_svg(&stack.gateway, &stack.environment).await;
		let orchestrator = MintOrchestrator::new(
			unfunded,
			stack.storage.clone(),
			MintOrchestrator::randomness_source(
				&stack.gateway,
				&stack.environment,
				&crate::test_support::config().oracle,
			),
			CommitEventLayout::V1,
			LocalStack::settings(),
		);

		assert!(matches!(
			orchestrator.commit(LocalStack::settings().value).await,
			Err(MintError::CommitFailed(_))
		));
		// underpaying the mint price is rejected as well
		let funded = stack.orchestrator();
		assert!(matches!(
			funded.commit(U256::from(1)).await,
			Err(MintError::CommitFailed(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_live_oracle_silent_times_out() {
		let stack = LocalStack::new().await;
		let timeout = Duration::from_secs(600);
		let orchestrator = stack.orchestrator_with(Arc::new(LiveSource::new(
			stack.gateway.clone(),
			stack.environment.vrf_coordinator,
			timeout,
			Duration::from_secs(5),
		)));

		let failure = orchestrator.run().await.unwrap_err();

		match failure.error {
			MintError::OracleTimeout { waited, .. } => assert!(waited >= timeout),
			other => panic!("unexpected error: {}", other),
		}
		let request = failure.request.unwrap();
		assert_eq!(request.status, MintStatus::AwaitingRandomness);
		assert_eq!(request.token_id, U256::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn test_live_oracle_matches_request_id() {
		let stack = LocalStack::new().await;
		// a second payment so two requests can be open at once
		crate::FundingStep::new(&stack.gateway, &stack.environment)
			.fund(stack.svg.address(), stack.environment.profile.fee)
			.await
			.unwrap();
		let orchestrator = stack.orchestrator_with(Arc::new(LiveSource::new(
			stack.gateway.clone(),
			stack.environment.vrf_coordinator,
			Duration::from_secs(60),
			Duration::from_secs(5),
		)));

		let first = orchestrator.commit(LocalStack::settings().value).await.unwrap();
		let second = orchestrator.commit(LocalStack::settings().value).await.unwrap();
		stack
			.chain
			.fulfill_as_oracle(
				stack.environment.vrf_coordinator,
				stack.svg.address(),
				second.request_id,
				U256::from(4242),
			)
			.unwrap();

		// only the second request was fulfilled
		assert!(matches!(
			orchestrator.await_callback(&first).await,
			Err(MintError::OracleTimeout { .. })
		));
		let callback = orchestrator.await_callback(&second).await.unwrap();
		assert_eq!(callback.random_value, U256::from(4242));

		let minted = orchestrator.resume(second.token_id).await.unwrap();
		assert_eq!(minted.status, MintStatus::Finalized);
	}

	#[tokio::test]
	async fn test_resume_after_restart() {
		let stack = LocalStack::new().await;
		let storage_dir = tempfile::tempdir().unwrap();
		let storage = || {
			Arc::new(StorageService::new(Box::new(FileStorage::new(
				storage_dir.path().to_path_buf(),
			))))
		};
		let randomness = MintOrchestrator::randomness_source(
			&stack.gateway,
			&stack.environment,
			&crate::test_support::config().oracle,
		);

		let before = MintOrchestrator::new(
			stack.svg.clone(),
			storage(),
			randomness.clone(),
			CommitEventLayout::V1,
			LocalStack::settings(),
		);
		let request = before.commit(LocalStack::settings().value).await.unwrap();
		drop(before);

		let after = MintOrchestrator::new(
			stack.svg.clone(),
			storage(),
			randomness,
			CommitEventLayout::V1,
			LocalStack::settings(),
		);
		assert_eq!(after.pending().await.unwrap(), vec![request.clone()]);

		let minted = after.resume(request.token_id).await.unwrap();
		assert_eq!(minted.status, MintStatus::Finalized);
		assert_eq!(minted.request_id, request.request_id);
		assert!(after.pending().await.unwrap().is_empty());

		let unknown = after.resume(U256::from(99)).await.unwrap_err();
		assert!(unknown.request.is_none());
	}

	#[tokio::test]
	async fn test_concurrent_mints_get_distinct_tokens() {
		let stack = LocalStack::new().await;
		for _ in 0..2 {
			crate::FundingStep::new(&stack.gateway, &stack.environment)
				.fund(stack.svg.address(), stack.environment.profile.fee)
				.await
				.unwrap();
		}
		let orchestrator = stack.orchestrator();

		let (a, b, c) = tokio::join!(orchestrator.run(), orchestrator.run(), orchestrator.run());
		let mut tokens = vec![
			a.unwrap().token_id,
			b.unwrap().token_id,
			c.unwrap().token_id,
		];
		tokens.sort();

		assert_eq!(tokens, vec![U256::ZERO, U256::from(1), U256::from(2)]);
		assert_eq!(
			stack.svg.token_counter().await.unwrap(),
			U256::from(3)
		);
	}

	#[test]
	fn test_commit_event_signature_is_v1() {
		use alloy_sol_types::SolEvent;
		assert_eq!(
			CommitEventLayout::V1.event_signature(),
			IRandomSVG::requestedRandomSVG::SIGNATURE_HASH
		);
	}

	#[tokio::test]
	async fn test_lost_uri_read_resumes_without_resubmitting() {
		let stack = LocalStack::new().await;
		let flaky = Arc::new(FlakyReads {
			chain: stack.chain.clone(),
			fail_next_call: AtomicBool::new(false),
			submitted: AtomicUsize::new(0),
		});
		let gateway = ContractGateway::new(
			flaky.clone(),
			Deployments::new(stack.dir.path().join("deployments")),
			ArtifactStore::new(stack.dir.path().join("artifacts")),
			ConfirmationSettings {
				confirmations: 1,
				timeout: Duration::from_secs(5),
				poll_interval: Duration::from_millis(10),
			},
			4,
		);
		let orchestrator = MintOrchestrator::new(
			RandomSvg::new(gateway.attach(RandomSvg::NAME, stack.svg.address())),
			stack.storage.clone(),
			MintOrchestrator::randomness_source(
				&stack.gateway,
				&stack.environment,
				&crate::test_support::config().oracle,
			),
			CommitEventLayout::V1,
			LocalStack::settings(),
		);
		let request = orchestrator.commit(LocalStack::settings().value).await.unwrap();
		orchestrator.await_callback(&request).await.unwrap();

		flaky.fail_next_call.store(true, Ordering::SeqCst);
		let first = orchestrator.finalize(request.token_id).await;

		assert!(matches!(first, Err(MintError::FinalizeFailed(_))));
		let on_chain = stack.svg.token_uri(request.token_id).await.unwrap();
		assert!(!on_chain.is_empty());
		let stored = orchestrator.pending().await.unwrap();
		assert_eq!(stored[0].status, MintStatus::AwaitingRandomness);
		assert!(stored[0].finalize_tx.is_some());
		let submitted = flaky.submitted.load(Ordering::SeqCst);

		let minted = orchestrator.resume(request.token_id).await.unwrap();

		assert_eq!(minted.status, MintStatus::Finalized);
		assert_eq!(minted.asset_locator.unwrap().as_str(), on_chain);
		assert_eq!(flaky.submitted.load(Ordering::SeqCst), submitted);
		assert!(orchestrator.pending().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_resume_after_unrecorded_simulated_callback() {
		let stack = LocalStack::new().await;
		let orchestrator = stack.orchestrator();
		let request = orchestrator.commit(LocalStack::settings().value).await.unwrap();

		// mined by a previous run that stopped before recording it
		let coordinator = VrfCoordinatorMock::new(
			stack
				.gateway
				.attach(VrfCoordinatorMock::NAME, stack.environment.vrf_coordinator),
		);
		let receipt = coordinator
			.call_back_with_randomness(request.request_id, U256::from(4242), stack.svg.address())
			.await
			.unwrap();
		assert!(receipt.success);

		let minted = orchestrator.resume(request.token_id).await.unwrap();

		assert_eq!(minted.status, MintStatus::Finalized);
		assert_eq!(minted.random_value, Some(U256::from(4242)));
		assert!(minted.asset_locator.is_some());
	}
}
