//! Network environment resolved once at startup.

use mint_config::Config;
use mint_gateway::contracts::{LinkToken, VrfCoordinatorMock};
use mint_gateway::{ContractGateway, GatewayError};
use mint_types::{Address, NetworkProfile};
use thiserror::Error;

/// Errors that can occur while resolving the network environment.
#[derive(Debug, Error)]
pub enum EnvironmentError {
	#[error("Network {0} is not configured")]
	UnknownNetwork(u64),
	#[error("Network {network} has no {contract} address")]
	MissingAddress {
		network: String,
		contract: &'static str,
	},
	#[error("Configured network {expected} but the RPC endpoint reports chain {actual}")]
	ChainMismatch { expected: u64, actual: u64 },
	/// Usually a missing mock deployment; run `deploy-mocks` first.
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),
}

/// Everything the minter needs to know about the network it runs on.
///
/// Simulated networks take the coordinator and payment-token addresses from
/// the mock deployments; live networks from the static profile.
#[derive(Debug, Clone)]
pub struct NetworkEnvironment {
	pub chain_id: u64,
	pub profile: NetworkProfile,
	pub vrf_coordinator: Address,
	pub link_token: Address,
}

impl NetworkEnvironment {
	/// Resolves the environment for `config.minter.network_id`.
	pub async fn resolve(
		config: &Config,
		gateway: &ContractGateway,
	) -> Result<Self, EnvironmentError> {
		let chain_id = config.minter.network_id;
		let profile = config
			.networks
			.get(&chain_id)
			.cloned()
			.ok_or(EnvironmentError::UnknownNetwork(chain_id))?;

		if gateway.chain_id() != chain_id {
			return Err(EnvironmentError::ChainMismatch {
				expected: chain_id,
				actual: gateway.chain_id(),
			});
		}

		let (vrf_coordinator, link_token) = if profile.simulated {
			let coordinator = gateway.get(VrfCoordinatorMock::NAME).await?;
			let link = gateway.get(LinkToken::NAME).await?;
			(coordinator.address, link.address)
		} else {
			let coordinator =
				profile
					.vrf_coordinator
					.ok_or_else(|| EnvironmentError::MissingAddress {
						network: profile.name.clone(),
						contract: "vrf_coordinator",
					})?;
			let link = profile
				.link_token
				.ok_or_else(|| EnvironmentError::MissingAddress {
					network: profile.name.clone(),
					contract: "link_token",
				})?;
			(coordinator, link)
		};

		tracing::info!(
			network = %profile.name,
			chain_id,
			simulated = profile.simulated,
			vrf_coordinator = %vrf_coordinator,
			link_token = %link_token,
			"Resolved network environment"
		);

		Ok(Self {
			chain_id,
			profile,
			vrf_coordinator,
			link_token,
		})
	}

	/// Whether randomness is delivered by the mock coordinator.
	pub fn is_simulated(&self) -> bool {
		self.profile.simulated
	}

	pub fn name(&self) -> &str {
		&self.profile.name
	}
}
