//! Fixtures for tests that run against the simulated chain.

use crate::{
	CommitEventLayout, FundingStep, MintOrchestrator, MintSettings, NetworkEnvironment,
	RandomnessSource,
};
use mint_config::Config;
use mint_gateway::contracts::{LinkToken, RandomSvg, VrfCoordinatorMock};
use mint_gateway::testing::{local_gateway, SimulatedChain, MINT_PRICE};
use mint_gateway::ContractGateway;
use mint_storage::implementations::memory::MemoryStorage;
use mint_storage::StorageService;
use mint_types::Address;
use std::sync::Arc;
use tempfile::TempDir;

pub const CONFIG: &str = r#"
[minter]
id = "random-svg-test"
network_id = 31337

[networks.31337]
name = "localhost"
key_hash = "0x2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311"
fee = "1000000000000000000"
simulated = true

[rpc]
url = "http://127.0.0.1:8545"

[account]
primary = "local"

[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[storage]
primary = "memory"

[storage.implementations.memory]
"#;

pub fn config() -> Config {
	CONFIG.parse().unwrap()
}

pub fn signer() -> Address {
	"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

/// Mocks, a funded `RandomSVG` and empty storage on a fresh chain.
pub struct LocalStack {
	pub chain: Arc<SimulatedChain>,
	pub gateway: ContractGateway,
	pub environment: NetworkEnvironment,
	pub storage: Arc<StorageService>,
	pub svg: RandomSvg,
	pub dir: TempDir,
}

impl LocalStack {
	pub async fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let chain = Arc::new(SimulatedChain::new(31337, signer()));
		let gateway = local_gateway(chain.clone(), dir.path()).unwrap();
		let config = config();

		let link = gateway.deploy(LinkToken::NAME, &[]).await.unwrap();
		gateway
			.deploy(
				VrfCoordinatorMock::NAME,
				&VrfCoordinatorMock::constructor_args(link.address),
			)
			.await
			.unwrap();
		let environment = NetworkEnvironment::resolve(&config, &gateway).await.unwrap();

		let svg = Self::deploy_svg(&gateway, &environment).await;
		FundingStep::new(&gateway, &environment)
			.fund(svg.address(), environment.profile.fee)
			.await
			.unwrap();

		Self {
			chain,
			gateway,
			environment,
			storage: Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			svg,
			dir,
		}
	}

	pub async fn deploy_svg(gateway: &ContractGateway, environment: &NetworkEnvironment) -> RandomSvg {
		let deployment = gateway
			.deploy(
				RandomSvg::NAME,
				&RandomSvg::constructor_args(
					environment.vrf_coordinator,
					environment.link_token,
					environment.profile.key_hash,
					environment.profile.fee,
				),
			)
			.await
			.unwrap();
		RandomSvg::new(gateway.attach(RandomSvg::NAME, deployment.address))
	}

	pub fn settings() -> MintSettings {
		MintSettings {
			value: MINT_PRICE,
			create_gas_limit: 300_000,
			finalize_gas_limit: 2_000_000,
		}
	}

	pub fn orchestrator_with(&self, randomness: Arc<dyn RandomnessSource>) -> MintOrchestrator {
		MintOrchestrator::new(
			self.svg.clone(),
			self.storage.clone(),
			randomness,
			CommitEventLayout::V1,
			Self::settings(),
		)
	}

	/// Orchestrator that fulfils through the mock coordinator with 77777.
	pub fn orchestrator(&self) -> MintOrchestrator {
		self.orchestrator_with(MintOrchestrator::randomness_source(
			&self.gateway,
			&self.environment,
			&config().oracle,
		))
	}
}
