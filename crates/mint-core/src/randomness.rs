//! Sources of oracle randomness.
//!
//! On simulated networks the minter plays the oracle itself and pushes a
//! fixed value through the mock coordinator. On live networks it waits for
//! the coordinator's `RandomnessRequestFulfilled` event.

use crate::MintError;
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use mint_gateway::contracts::{IRandomSVG, IVRFCoordinator, VrfCoordinatorMock};
use mint_gateway::ContractGateway;
use mint_types::{truncate_id, Address, LogQuery, MintRequest, OracleCallback, B256, U256};
use std::time::Duration;
use tokio::time::Instant;

/// Delivers the random value for a committed mint.
#[async_trait]
pub trait RandomnessSource: Send + Sync {
	/// Suspends until the value for `request.request_id` is available.
	async fn await_randomness(&self, request: &MintRequest) -> Result<OracleCallback, MintError>;
}

/// Fulfils requests immediately through the mock coordinator.
pub struct SimulatedSource {
	coordinator: VrfCoordinatorMock,
	random_value: U256,
}

impl SimulatedSource {
	pub fn new(coordinator: VrfCoordinatorMock, random_value: U256) -> Self {
		Self {
			coordinator,
			random_value,
		}
	}
}

impl SimulatedSource {
	/// Value the consumer already accepted for this token, if a callback was
	/// mined without being recorded.
	async fn delivered(&self, request: &MintRequest) -> Result<Option<U256>, MintError> {
		let query = LogQuery::new(
			request.contract,
			IRandomSVG::CreatedUnfinishedRandomSVG::SIGNATURE_HASH,
			request.commit_block,
		)
		.with_topic1(B256::from(request.token_id.to_be_bytes::<32>()));
		let logs = self.coordinator.handle().gateway().get_logs(&query).await?;

		Ok(logs
			.iter()
			.filter_map(|log| IRandomSVG::CreatedUnfinishedRandomSVG::decode_log(log, true).ok())
			.find(|event| event.tokenId == request.token_id)
			.map(|event| event.randomNumber))
	}
}

#[async_trait]
impl RandomnessSource for SimulatedSource {
	async fn await_randomness(&self, request: &MintRequest) -> Result<OracleCallback, MintError> {
		if let Some(random_value) = self.delivered(request).await? {
			tracing::info!("Mock callback was already delivered");
			return Ok(OracleCallback {
				request_id: request.request_id,
				random_value,
				consumer: request.contract,
			});
		}

		let receipt = self
			.coordinator
			.call_back_with_randomness(request.request_id, self.random_value, request.contract)
			.await?;
		if !receipt.success {
			return Err(MintError::CallbackRejected(format!(
				"callBackWithRandomness reverted in {}",
				receipt.hash
			)));
		}

		// The mock swallows consumer failures, so acceptance is only visible
		// through the consumer's own event.
		let accepted = receipt
			.logs
			.iter()
			.filter(|log| log.address == request.contract)
			.filter_map(|log| IRandomSVG::CreatedUnfinishedRandomSVG::decode_log(log, true).ok())
			.find(|event| event.tokenId == request.token_id)
			.ok_or_else(|| {
				MintError::CallbackRejected(format!(
					"consumer {} did not accept randomness for token {}",
					request.contract, request.token_id
				))
			})?;

		Ok(OracleCallback {
			request_id: request.request_id,
			random_value: accepted.randomNumber,
			consumer: request.contract,
		})
	}
}

/// Polls the live coordinator for the fulfilment event.
pub struct LiveSource {
	gateway: ContractGateway,
	coordinator: Address,
	timeout: Duration,
	poll_interval: Duration,
}

impl LiveSource {
	pub fn new(
		gateway: ContractGateway,
		coordinator: Address,
		timeout: Duration,
		poll_interval: Duration,
	) -> Self {
		Self {
			gateway,
			coordinator,
			timeout,
			poll_interval,
		}
	}
}

#[async_trait]
impl RandomnessSource for LiveSource {
	async fn await_randomness(&self, request: &MintRequest) -> Result<OracleCallback, MintError> {
		// requestId is not indexed, so every fulfilment since the commit block
		// is fetched and matched locally
		let query = LogQuery::new(
			self.coordinator,
			IVRFCoordinator::RandomnessRequestFulfilled::SIGNATURE_HASH,
			request.commit_block,
		);
		let start = Instant::now();

		tracing::info!(
			timeout_secs = self.timeout.as_secs(),
			"Waiting for oracle fulfilment"
		);

		loop {
			match self.gateway.get_logs(&query).await {
				Ok(logs) => {
					let fulfilled = logs.iter().find_map(|log| {
						IVRFCoordinator::RandomnessRequestFulfilled::decode_log(log, true)
							.ok()
							.filter(|event| event.requestId == request.request_id)
					});
					if let Some(event) = fulfilled {
						tracing::info!(
							elapsed_secs = start.elapsed().as_secs(),
							"Oracle fulfilled request"
						);
						return Ok(OracleCallback {
							request_id: event.requestId,
							random_value: event.output,
							consumer: request.contract,
						});
					}
				},
				Err(e) => {
					tracing::warn!(error = %e, "Failed to fetch fulfilment events, will retry");
				},
			}

			let elapsed = start.elapsed();
			if elapsed >= self.timeout {
				tracing::warn!(
					request_id = %truncate_id(&request.request_id.to_string()),
					"Oracle did not respond in time"
				);
				return Err(MintError::OracleTimeout {
					request_id: request.request_id,
					waited: elapsed,
				});
			}
			tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
		}
	}
}
