//! Assembles the minter's services from configuration.
//!
//! The chain client is built separately from the rest so that tests (and
//! the deploy commands, which run before a mint contract exists) can plug
//! in their own client and stop at whatever stage they need.

use crate::environment::{EnvironmentError, NetworkEnvironment};
use crate::orchestrator::{MintOrchestrator, MintSettings};
use crate::receipt::CommitEventLayout;
use mint_account::{AccountError, AccountService};
use mint_config::Config;
use mint_gateway::contracts::RandomSvg;
use mint_gateway::implementations::alloy::AlloyClient;
use mint_gateway::{
	ArtifactStore, ChainClient, ConfirmationSettings, ContractGateway, Deployments, GatewayError,
};
use mint_storage::{StorageError, StorageService};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on retrying a single read-only RPC call.
const READ_RETRY_WINDOW: Duration = Duration::from_secs(30);

/// Errors that can occur while assembling the minter.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),
	#[error("Environment error: {0}")]
	Environment(#[from] EnvironmentError),
}

/// Builder for the minter's services.
pub struct MinterBuilder {
	config: Config,
}

impl MinterBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Connects to the configured RPC endpoint with the primary account.
	pub async fn connect(&self) -> Result<Arc<dyn ChainClient>, BuilderError> {
		let primary = &self.config.account.primary;
		let account_config = self
			.config
			.account
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!("Primary account '{}' is not configured", primary))
			})?;
		let account = AccountService::from_config(primary, account_config)?;
		let address = account.get_address().await?;
		tracing::info!(component = "account", implementation = %primary, address = %address, "Loaded");

		let client = AlloyClient::new(
			&self.config.rpc.url,
			self.config.minter.network_id,
			&account.get_private_key(),
			READ_RETRY_WINDOW,
		)?;
		Ok(Arc::new(client))
	}

	/// Wraps `client` in a gateway using the configured deployment records,
	/// artifacts and confirmation policy.
	pub fn gateway(&self, client: Arc<dyn ChainClient>) -> Result<ContractGateway, BuilderError> {
		let network = self
			.config
			.active_network()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let deployments = Path::new(&self.config.deployments.path).join(&network.name);

		Ok(ContractGateway::new(
			client,
			Deployments::new(deployments),
			ArtifactStore::new(&self.config.deployments.artifacts),
			ConfirmationSettings {
				confirmations: self.config.rpc.confirmations,
				timeout: self.config.rpc.confirmation_timeout(),
				poll_interval: self.config.rpc.poll_interval(),
			},
			self.config.rpc.max_in_flight,
		))
	}

	/// Creates the primary storage backend.
	pub fn storage(&self) -> Result<Arc<StorageService>, BuilderError> {
		let primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!("Primary storage '{}' is not configured", primary))
			})?;
		let backend = mint_storage::create_backend(primary, storage_config)?;
		tracing::info!(component = "storage", implementation = %primary, "Loaded");
		Ok(Arc::new(StorageService::new(backend)))
	}

	pub async fn environment(
		&self,
		gateway: &ContractGateway,
	) -> Result<NetworkEnvironment, BuilderError> {
		Ok(NetworkEnvironment::resolve(&self.config, gateway).await?)
	}

	/// Attaches to the deployed mint contract and builds the orchestrator.
	pub async fn orchestrator(
		&self,
		gateway: &ContractGateway,
		environment: &NetworkEnvironment,
		storage: Arc<StorageService>,
	) -> Result<MintOrchestrator, BuilderError> {
		let layout = CommitEventLayout::from_version(self.config.oracle.commit_event_version)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Unsupported commit event version {}",
					self.config.oracle.commit_event_version
				))
			})?;
		let contract = RandomSvg::new(gateway.attach_deployed(RandomSvg::NAME).await?);
		let randomness =
			MintOrchestrator::randomness_source(gateway, environment, &self.config.oracle);

		Ok(MintOrchestrator::new(
			contract,
			storage,
			randomness,
			layout,
			MintSettings {
				value: self.config.minter.mint_value,
				create_gas_limit: self.config.minter.create_gas_limit,
				finalize_gas_limit: self.config.minter.finalize_gas_limit,
			},
		))
	}
}
