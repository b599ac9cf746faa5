//! Command-line entry point for the random SVG minter.
//!
//! Deploys the mint contract (and the oracle mocks on local networks), funds
//! it with the oracle fee and drives mints through commit, oracle callback
//! and finalization.

use clap::{Parser, Subcommand};
use futures::future::join_all;
use mint_config::Config;
use mint_core::{FundingStep, MinterBuilder, NetworkEnvironment};
use mint_gateway::contracts::{LinkToken, RandomSvg, VrfCoordinatorMock};
use mint_gateway::ContractGateway;
use mint_types::{format_token_amount, truncate_id, Address, U256};
use std::path::PathBuf;

/// Command-line arguments for the minter.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "MINTER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Deploy LinkToken and VRFCoordinatorMock on a simulated network
	DeployMocks,
	/// Deploy RandomSVG and fund it with the oracle fee
	Deploy {
		/// Skip the funding transfer
		#[arg(long)]
		no_fund: bool,
	},
	/// Transfer LINK to the deployed RandomSVG
	Fund {
		/// Amount in wei; defaults to the network's oracle fee
		#[arg(long)]
		amount: Option<U256>,
	},
	/// Mint new tokens
	Mint {
		/// Number of concurrent mints
		#[arg(long, default_value_t = 1)]
		count: usize,
	},
	/// Continue an interrupted mint
	Resume {
		#[arg(long)]
		token_id: U256,
	},
	/// List mints that have not been finalized
	Pending,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.minter.id);

	let builder = MinterBuilder::new(config);
	let client = builder.connect().await?;
	let gateway = builder.gateway(client)?;

	match args.command {
		Command::DeployMocks => deploy_mocks(&builder, &gateway).await,
		Command::Deploy { no_fund } => deploy(&builder, &gateway, !no_fund).await,
		Command::Fund { amount } => {
			let environment = builder.environment(&gateway).await?;
			let contract = gateway.get(RandomSvg::NAME).await?;
			fund(&gateway, &environment, contract.address, amount).await
		},
		Command::Mint { count } => mint(&builder, &gateway, count).await,
		Command::Resume { token_id } => {
			let environment = builder.environment(&gateway).await?;
			let orchestrator = builder
				.orchestrator(&gateway, &environment, builder.storage()?)
				.await?;
			let minted = orchestrator.resume(token_id).await?;
			tracing::info!(
				token_id = %minted.token_id,
				status = %minted.status,
				"Resumed mint"
			);
			Ok(())
		},
		Command::Pending => {
			let environment = builder.environment(&gateway).await?;
			let orchestrator = builder
				.orchestrator(&gateway, &environment, builder.storage()?)
				.await?;
			for request in orchestrator.pending().await? {
				println!(
					"{}\t{}\t{}",
					request.token_id, request.status, request.request_id
				);
			}
			Ok(())
		},
	}
}

async fn deploy_mocks(
	builder: &MinterBuilder,
	gateway: &ContractGateway,
) -> Result<(), Box<dyn std::error::Error>> {
	let network = builder.config().active_network()?;
	if !network.simulated {
		tracing::warn!(network = %network.name, "Not a simulated network, skipping mocks");
		return Ok(());
	}

	tracing::info!(network = %network.name, "Deploying mocks");
	let link = gateway.deploy(LinkToken::NAME, &[]).await?;
	let coordinator = gateway
		.deploy(
			VrfCoordinatorMock::NAME,
			&VrfCoordinatorMock::constructor_args(link.address),
		)
		.await?;
	tracing::info!(
		link_token = %link.address,
		vrf_coordinator = %coordinator.address,
		"Mocks deployed"
	);
	Ok(())
}

async fn deploy(
	builder: &MinterBuilder,
	gateway: &ContractGateway,
	fund_after: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let environment = builder.environment(gateway).await?;
	let profile = &environment.profile;

	let deployment = gateway
		.deploy(
			RandomSvg::NAME,
			&RandomSvg::constructor_args(
				environment.vrf_coordinator,
				environment.link_token,
				profile.key_hash,
				profile.fee,
			),
		)
		.await?;
	tracing::info!(
		"Verify with: verify --network {} {} {} {} {} {}",
		profile.name,
		deployment.address,
		environment.vrf_coordinator,
		environment.link_token,
		profile.key_hash,
		profile.fee
	);

	if fund_after {
		fund(gateway, &environment, deployment.address, None).await?;
	}
	Ok(())
}

async fn fund(
	gateway: &ContractGateway,
	environment: &NetworkEnvironment,
	consumer: Address,
	amount: Option<U256>,
) -> Result<(), Box<dyn std::error::Error>> {
	let amount = amount.unwrap_or(environment.profile.fee);
	let balance = FundingStep::new(gateway, environment)
		.fund(consumer, amount)
		.await?;
	tracing::info!(
		consumer = %consumer,
		balance = %format_token_amount(&balance.to_string(), 18),
		"Funding complete"
	);
	Ok(())
}

async fn mint(
	builder: &MinterBuilder,
	gateway: &ContractGateway,
	count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
	let environment = builder.environment(gateway).await?;
	let orchestrator = builder
		.orchestrator(gateway, &environment, builder.storage()?)
		.await?;
	tracing::info!(
		contract = %orchestrator.contract_address(),
		count,
		"Starting mints"
	);

	let results = join_all((0..count).map(|_| orchestrator.run())).await;

	let mut failed = 0;
	for result in results {
		match result {
			Ok(minted) => {
				let locator = minted
					.asset_locator
					.as_ref()
					.map(|l| truncate_id(l.as_str()))
					.unwrap_or_default();
				tracing::info!(
					token_id = %minted.token_id,
					locator = %locator,
					"Minted"
				);
			},
			Err(failure) => {
				failed += 1;
				tracing::error!("{}", failure);
			},
		}
	}

	if failed > 0 {
		return Err(format!("{} of {} mints failed", failed, count).into());
	}
	Ok(())
}
