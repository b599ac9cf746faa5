//! Mint request state machine.
//!
//! Persists every transition through the storage service so that an
//! interrupted mint can be resumed. Requests only move forward:
//! Committed -> AwaitingRandomness -> Finalized.

use mint_storage::{StorageError, StorageService};
use mint_types::{
	current_timestamp, Address, AssetLocator, MintRequest, MintStatus, StorageKey, B256, U256,
};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during mint state management.
#[derive(Debug, Error)]
pub enum MintStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: MintStatus, to: MintStatus },
	#[error("Mint not found: {0}")]
	NotFound(String),
}

impl From<StorageError> for MintStateError {
	fn from(err: StorageError) -> Self {
		MintStateError::Storage(err.to_string())
	}
}

/// Manages mint state transitions and persistence
pub struct MintStateMachine {
	storage: Arc<StorageService>,
}

impl MintStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Persists a freshly committed request.
	pub async fn record(&self, request: &MintRequest) -> Result<(), MintStateError> {
		self.storage
			.store(StorageKey::Mints.as_str(), &request.storage_id(), request)
			.await?;
		Ok(())
	}

	pub async fn load(&self, contract: &Address, token_id: U256) -> Result<MintRequest, MintStateError> {
		self.load_by_id(&MintRequest::storage_id_for(contract, token_id))
			.await
	}

	async fn load_by_id(&self, id: &str) -> Result<MintRequest, MintStateError> {
		match self.storage.retrieve(StorageKey::Mints.as_str(), id).await {
			Ok(request) => Ok(request),
			Err(StorageError::NotFound) => Err(MintStateError::NotFound(id.to_string())),
			Err(e) => Err(e.into()),
		}
	}

	/// Updates a request with a closure and persists it
	pub async fn update_with<F>(&self, id: &str, updater: F) -> Result<MintRequest, MintStateError>
	where
		F: FnOnce(&mut MintRequest),
	{
		let mut request = self.load_by_id(id).await?;
		updater(&mut request);
		request.updated_at = current_timestamp();

		self.storage
			.update(StorageKey::Mints.as_str(), id, &request)
			.await?;
		Ok(request)
	}

	/// Transitions a request to a new status with validation
	pub async fn transition(
		&self,
		id: &str,
		new_status: MintStatus,
	) -> Result<MintRequest, MintStateError> {
		let request = self.load_by_id(id).await?;
		if !Self::is_valid_transition(request.status, new_status) {
			return Err(MintStateError::InvalidTransition {
				from: request.status,
				to: new_status,
			});
		}

		self.update_with(id, |r| r.status = new_status).await
	}

	/// Records the oracle's value. The status stays `AwaitingRandomness`
	/// until `finishMint` succeeds.
	pub async fn record_randomness(
		&self,
		id: &str,
		random_value: U256,
	) -> Result<MintRequest, MintStateError> {
		let request = self.load_by_id(id).await?;
		if request.status != MintStatus::AwaitingRandomness {
			return Err(MintStateError::InvalidTransition {
				from: request.status,
				to: MintStatus::AwaitingRandomness,
			});
		}
		self.update_with(id, |r| r.random_value = Some(random_value))
			.await
	}

	/// Records the mined `finishMint` transaction ahead of the URI read-back,
	/// so a resumed mint does not submit it again.
	pub async fn record_finalize_tx(
		&self,
		id: &str,
		tx_hash: B256,
	) -> Result<MintRequest, MintStateError> {
		let request = self.load_by_id(id).await?;
		if request.status != MintStatus::AwaitingRandomness {
			return Err(MintStateError::InvalidTransition {
				from: request.status,
				to: MintStatus::Finalized,
			});
		}
		self.update_with(id, |r| r.finalize_tx = Some(tx_hash)).await
	}

	/// Moves a request to `Finalized` and stores its locator.
	pub async fn finalize(
		&self,
		id: &str,
		locator: AssetLocator,
	) -> Result<MintRequest, MintStateError> {
		let request = self.load_by_id(id).await?;
		if !Self::is_valid_transition(request.status, MintStatus::Finalized) {
			return Err(MintStateError::InvalidTransition {
				from: request.status,
				to: MintStatus::Finalized,
			});
		}
		self.update_with(id, |r| {
			r.status = MintStatus::Finalized;
			r.asset_locator = Some(locator);
		})
		.await
	}

	/// Requests that have not reached `Finalized`, ordered by token id.
	pub async fn pending(&self, contract: Option<Address>) -> Result<Vec<MintRequest>, MintStateError> {
		let mut requests: Vec<MintRequest> = self
			.storage
			.list::<MintRequest>(StorageKey::Mints.as_str())
			.await?
			.into_iter()
			.filter(|r| r.status != MintStatus::Finalized)
			.filter(|r| contract.map_or(true, |c| r.contract == c))
			.collect();
		requests.sort_by_key(|r| r.token_id);
		Ok(requests)
	}

	fn is_valid_transition(from: MintStatus, to: MintStatus) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<MintStatus, HashSet<MintStatus>>> = Lazy::new(|| {
			HashMap::from([
				(
					MintStatus::Committed,
					HashSet::from([MintStatus::AwaitingRandomness]),
				),
				(
					MintStatus::AwaitingRandomness,
					HashSet::from([MintStatus::Finalized]),
				),
				(MintStatus::Finalized, HashSet::new()), // terminal
			])
		});

		TRANSITIONS
			.get(&from)
			.is_some_and(|allowed| allowed.contains(&to))
	}
}
