//! In-process chain that emulates the minting contracts.
//!
//! Contract creation is recognised by a one-byte marker at the start of the
//! init code (see [`write_artifacts`]); constructor arguments follow it.
//! Every submitted transaction is mined into its own block immediately.
//! Failed checks leave state untouched and mine a receipt with
//! `success == false`, the way a transaction sent with an explicit gas limit
//! reverts on a real node.

use crate::contracts::{ILinkToken, IRandomSVG, IVRFCoordinator, IVRFCoordinatorMock};
use crate::{ArtifactStore, ChainClient, ConfirmationSettings, ContractGateway, Deployments};
use crate::GatewayError;
use alloy_primitives::{keccak256, Address, Bytes, Log, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use mint_types::{LogQuery, Transaction, TransactionReceipt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

sol! {
	interface IERC677 {
		event Transfer(address indexed from, address indexed to, uint256 value, bytes data);
	}
}

pub const LINK_TOKEN_MARKER: u8 = 0xa1;
pub const VRF_COORDINATOR_MARKER: u8 = 0xa2;
pub const RANDOM_SVG_MARKER: u8 = 0xa3;

/// Minimum native value `create()` accepts (0.1 ether).
pub const MINT_PRICE: U256 = U256::from_limbs([100_000_000_000_000_000, 0, 0, 0]);

/// LINK minted to the token deployer (1e27).
const LINK_SUPPLY: U256 = U256::from_limbs([0x9fd0_803c_e800_0000, 0x33b2_e3c, 0, 0]);

const MAX_PATHS: u64 = 10;

/// Writes deployable artifacts for every emulated contract into `dir`.
pub fn write_artifacts(dir: &Path) -> std::io::Result<()> {
	std::fs::create_dir_all(dir)?;
	for (name, marker) in [
		("LinkToken", LINK_TOKEN_MARKER),
		("VRFCoordinatorMock", VRF_COORDINATOR_MARKER),
		("RandomSVG", RANDOM_SVG_MARKER),
	] {
		std::fs::write(
			dir.join(format!("{}.json", name)),
			format!(
				r#"{{"contractName":"{}","bytecode":"0x{:02x}"}}"#,
				name, marker
			),
		)?;
	}
	Ok(())
}

/// Builds a gateway over `chain` with artifacts and deployment records
/// under `dir`, polling fast enough for tests.
pub fn local_gateway(chain: Arc<SimulatedChain>, dir: &Path) -> std::io::Result<ContractGateway> {
	let artifacts = dir.join("artifacts");
	write_artifacts(&artifacts)?;

	Ok(ContractGateway::new(
		chain as Arc<dyn ChainClient>,
		Deployments::new(dir.join("deployments")),
		ArtifactStore::new(artifacts),
		ConfirmationSettings {
			confirmations: 1,
			timeout: Duration::from_secs(5),
			poll_interval: Duration::from_millis(10),
		},
		4,
	))
}

#[derive(Default)]
struct LinkTokenState {
	balances: HashMap<Address, U256>,
}

struct RandomSvgState {
	coordinator: Address,
	link: Address,
	key_hash: B256,
	fee: U256,
	token_counter: U256,
	vrf_nonce: U256,
	request_to_token: HashMap<B256, U256>,
	random_numbers: HashMap<U256, U256>,
	uris: HashMap<U256, String>,
}

enum Contract {
	Link(LinkTokenState),
	Coordinator,
	Svg(Box<RandomSvgState>),
}

#[derive(Clone, Copy)]
enum Kind {
	Link,
	Coordinator,
	Svg,
}

#[derive(Default)]
struct ChainState {
	block: u64,
	nonce: u64,
	contracts: HashMap<Address, Contract>,
	receipts: HashMap<B256, TransactionReceipt>,
	logs: Vec<(u64, Log)>,
	drop_commit_events: bool,
}

type Revert = String;

fn selector_of(tx: &Transaction) -> [u8; 4] {
	tx.data
		.get(..4)
		.and_then(|s| <[u8; 4]>::try_from(s).ok())
		.unwrap_or_default()
}

fn log_of(address: Address, event: &impl SolEvent) -> Log {
	Log {
		address,
		data: event.encode_log_data(),
	}
}

impl ChainState {
	fn link_mut(&mut self, address: Address) -> Result<&mut LinkTokenState, Revert> {
		match self.contracts.get_mut(&address) {
			Some(Contract::Link(state)) => Ok(state),
			_ => Err(format!("{} is not a LinkToken", address)),
		}
	}

	fn svg_mut(&mut self, address: Address) -> Result<&mut RandomSvgState, Revert> {
		match self.contracts.get_mut(&address) {
			Some(Contract::Svg(state)) => Ok(state.as_mut()),
			_ => Err(format!("{} is not a RandomSVG", address)),
		}
	}

	fn svg(&self, address: Address) -> Result<&RandomSvgState, Revert> {
		match self.contracts.get(&address) {
			Some(Contract::Svg(state)) => Ok(state.as_ref()),
			_ => Err(format!("{} is not a RandomSVG", address)),
		}
	}

	fn execute(
		&mut self,
		from: Address,
		nonce: u64,
		tx: &Transaction,
	) -> Result<(Option<Address>, Vec<Log>), Revert> {
		let Some(to) = tx.to else {
			return self.create_contract(from, nonce, &tx.data).map(|a| (Some(a), Vec::new()));
		};
		let selector = selector_of(tx);

		let kind = match self.contracts.get(&to) {
			Some(Contract::Svg(_)) => Kind::Svg,
			Some(Contract::Link(_)) => Kind::Link,
			Some(Contract::Coordinator) => Kind::Coordinator,
			None => return Err(format!("no contract at {}", to)),
		};

		let logs = match kind {
			Kind::Svg if selector == IRandomSVG::createCall::SELECTOR => {
				self.svg_create(to, tx.value)?
			},
			Kind::Svg if selector == IRandomSVG::finishMintCall::SELECTOR => {
				let call = IRandomSVG::finishMintCall::abi_decode(&tx.data, true)
					.map_err(|e| e.to_string())?;
				self.svg_finish(to, call.tokenId)?
			},
			Kind::Link if selector == ILinkToken::transferCall::SELECTOR => {
				let call =
					ILinkToken::transferCall::abi_decode(&tx.data, true).map_err(|e| e.to_string())?;
				self.link_transfer(to, from, call.to, call.value)?
			},
			Kind::Coordinator
				if selector == IVRFCoordinatorMock::callBackWithRandomnessCall::SELECTOR =>
			{
				let call =
					IVRFCoordinatorMock::callBackWithRandomnessCall::abi_decode(&tx.data, true)
						.map_err(|e| e.to_string())?;
				// the mock ignores whether the consumer accepted the callback
				self.fulfill(to, call.consumerContract, call.requestId, call.randomness)
					.unwrap_or_default()
			},
			_ => return Err("unknown function".into()),
		};
		Ok((None, logs))
	}

	fn create_contract(&mut self, from: Address, nonce: u64, code: &[u8]) -> Result<Address, Revert> {
		let (marker, args) = code.split_first().ok_or_else(|| "empty init code".to_string())?;
		let contract = match *marker {
			LINK_TOKEN_MARKER => {
				let mut state = LinkTokenState::default();
				state.balances.insert(from, LINK_SUPPLY);
				Contract::Link(state)
			},
			VRF_COORDINATOR_MARKER => {
				Address::abi_decode(args, true).map_err(|e| e.to_string())?;
				Contract::Coordinator
			},
			RANDOM_SVG_MARKER => {
				let (coordinator, link, key_hash, fee) =
					<(Address, Address, B256, U256)>::abi_decode_params(args, true)
						.map_err(|e| e.to_string())?;
				Contract::Svg(Box::new(RandomSvgState {
					coordinator,
					link,
					key_hash,
					fee,
					token_counter: U256::ZERO,
					vrf_nonce: U256::ZERO,
					request_to_token: HashMap::new(),
					random_numbers: HashMap::new(),
					uris: HashMap::new(),
				}))
			},
			other => return Err(format!("unknown init code marker {:#04x}", other)),
		};
		let address = from.create(nonce);
		self.contracts.insert(address, contract);
		Ok(address)
	}

	fn link_transfer(
		&mut self,
		link: Address,
		from: Address,
		to: Address,
		value: U256,
	) -> Result<Vec<Log>, Revert> {
		let state = self.link_mut(link)?;
		let balance = state.balances.get(&from).copied().unwrap_or_default();
		if balance < value {
			return Err("transfer amount exceeds balance".into());
		}
		state.balances.insert(from, balance - value);
		*state.balances.entry(to).or_default() += value;
		Ok(vec![log_of(
			link,
			&ILinkToken::Transfer {
				from,
				to,
				value,
			},
		)])
	}

	/// `create()`: pays the oracle with `transferAndCall` and reserves a token.
	fn svg_create(&mut self, svg_address: Address, value: U256) -> Result<Vec<Log>, Revert> {
		let svg = self.svg(svg_address)?;
		let (link, coordinator, key_hash, fee, vrf_nonce) =
			(svg.link, svg.coordinator, svg.key_hash, svg.fee, svg.vrf_nonce);
		if value < MINT_PRICE {
			return Err("Need to send more ETH".into());
		}
		let balance = self
			.link_mut(link)?
			.balances
			.get(&svg_address)
			.copied()
			.unwrap_or_default();
		if balance < fee {
			return Err("Not enough LINK".into());
		}

		let user_seed = U256::ZERO;
		let mut logs = self.link_transfer(link, svg_address, coordinator, fee)?;
		logs.push(log_of(
			link,
			&IERC677::Transfer {
				from: svg_address,
				to: coordinator,
				value: fee,
				data: Bytes::from((key_hash, user_seed).abi_encode()),
			},
		));
		logs.push(log_of(
			coordinator,
			&IVRFCoordinatorMock::RandomnessRequest {
				sender: svg_address,
				keyHash: key_hash,
				seed: user_seed,
			},
		));

		let vrf_seed = U256::from_be_bytes(
			keccak256((key_hash, user_seed, svg_address, vrf_nonce).abi_encode()).0,
		);
		let request_id = keccak256([key_hash.as_slice(), &vrf_seed.to_be_bytes::<32>()].concat());

		let drop_commit_event = self.drop_commit_events;
		let svg = self.svg_mut(svg_address)?;
		svg.vrf_nonce += U256::from(1);
		let token_id = svg.token_counter;
		svg.token_counter += U256::from(1);
		svg.request_to_token.insert(request_id, token_id);

		if !drop_commit_event {
			logs.push(log_of(
				svg_address,
				&IRandomSVG::requestedRandomSVG {
					requestId: request_id,
					tokenId: token_id,
				},
			));
		}
		Ok(logs)
	}

	/// Delivers randomness to a consumer the way `rawFulfillRandomness` does.
	fn fulfill(
		&mut self,
		coordinator: Address,
		consumer: Address,
		request_id: B256,
		randomness: U256,
	) -> Result<Vec<Log>, Revert> {
		let svg = self.svg_mut(consumer)?;
		if svg.coordinator != coordinator {
			return Err("Only VRFCoordinator can fulfill".into());
		}
		let token_id = *svg
			.request_to_token
			.get(&request_id)
			.ok_or_else(|| "unknown request".to_string())?;
		if svg.random_numbers.contains_key(&token_id) {
			return Err("ERC721: token already minted".into());
		}
		svg.random_numbers.insert(token_id, randomness);
		Ok(vec![log_of(
			consumer,
			&IRandomSVG::CreatedUnfinishedRandomSVG {
				tokenId: token_id,
				randomNumber: randomness,
			},
		)])
	}

	fn svg_finish(&mut self, svg_address: Address, token_id: U256) -> Result<Vec<Log>, Revert> {
		let svg = self.svg_mut(svg_address)?;
		if svg.uris.contains_key(&token_id) {
			return Err("tokenURI is already all set!".into());
		}
		if svg.token_counter <= token_id {
			return Err("TokenId has not been minted yet!".into());
		}
		let random = svg
			.random_numbers
			.get(&token_id)
			.copied()
			.filter(|value| !value.is_zero())
			.ok_or_else(|| "Need to wait for Chainlink VRF".to_string())?;

		let uri = render_token_uri(random);
		svg.uris.insert(token_id, uri.clone());
		Ok(vec![log_of(
			svg_address,
			&IRandomSVG::CreatedRandomSVG {
				tokenId: token_id,
				tokenURI: uri,
			},
		)])
	}

	fn view(&self, tx: &Transaction) -> Result<Vec<u8>, Revert> {
		let to = tx.to.ok_or_else(|| "call without target".to_string())?;
		let selector = selector_of(tx);

		match self.contracts.get(&to) {
			Some(Contract::Svg(svg)) if selector == IRandomSVG::tokenURICall::SELECTOR => {
				let call =
					IRandomSVG::tokenURICall::abi_decode(&tx.data, true).map_err(|e| e.to_string())?;
				if !svg.random_numbers.contains_key(&call.tokenId) {
					return Err("ERC721URIStorage: URI query for nonexistent token".into());
				}
				let uri = svg.uris.get(&call.tokenId).cloned().unwrap_or_default();
				Ok(IRandomSVG::tokenURICall::abi_encode_returns(&(uri,)))
			},
			Some(Contract::Svg(svg)) if selector == IRandomSVG::tokenCounterCall::SELECTOR => {
				Ok(IRandomSVG::tokenCounterCall::abi_encode_returns(&(svg.token_counter,)))
			},
			Some(Contract::Link(link)) if selector == ILinkToken::balanceOfCall::SELECTOR => {
				let call =
					ILinkToken::balanceOfCall::abi_decode(&tx.data, true).map_err(|e| e.to_string())?;
				let balance = link.balances.get(&call.owner).copied().unwrap_or_default();
				Ok(ILinkToken::balanceOfCall::abi_encode_returns(&(balance,)))
			},
			Some(_) => Err("unsupported view".into()),
			None => Err(format!("no contract at {}", to)),
		}
	}
}

/// Deterministic token URI for a random value.
fn render_token_uri(random: U256) -> String {
	let path_count = 1 + (random % U256::from(MAX_PATHS)).to::<u64>();
	let mut svg =
		String::from("<svg xmlns='http://www.w3.org/2000/svg' height='500' width='500'>");
	for i in 0..path_count {
		let word = keccak256((random, U256::from(i)).abi_encode());
		let coord = |at: usize| u16::from_be_bytes([word[at], word[at + 1]]) % 500;
		svg.push_str(&format!(
			"<path d='M {} {} L {} {}' fill='transparent' stroke='#{:02x}{:02x}{:02x}'/>",
			coord(3),
			coord(5),
			coord(7),
			coord(9),
			word[0],
			word[1],
			word[2]
		));
	}
	svg.push_str("</svg>");
	format!(
		"data:application/json;utf8,{{\"name\":\"SVG NFT\",\"description\":\"An NFT based on SVG!\",\"attributes\":\"\",\"image\":\"data:image/svg+xml;utf8,{}\"}}",
		svg
	)
}

/// Simulated chain signing for a single account.
pub struct SimulatedChain {
	chain_id: u64,
	signer: Address,
	state: Mutex<ChainState>,
}

impl SimulatedChain {
	pub fn new(chain_id: u64, signer: Address) -> Self {
		Self {
			chain_id,
			signer,
			state: Mutex::new(ChainState::default()),
		}
	}

	fn state(&self) -> Result<MutexGuard<'_, ChainState>, GatewayError> {
		self.state
			.lock()
			.map_err(|_| GatewayError::Network("simulated chain state poisoned".into()))
	}

	/// Makes later `create()` calls omit the `requestedRandomSVG` event.
	pub fn drop_commit_events(&self, drop: bool) -> Result<(), GatewayError> {
		self.state()?.drop_commit_events = drop;
		Ok(())
	}

	/// Fulfills a request the way the live coordinator does: the consumer
	/// receives the value and the coordinator emits
	/// `RandomnessRequestFulfilled` in a new block.
	pub fn fulfill_as_oracle(
		&self,
		coordinator: Address,
		consumer: Address,
		request_id: B256,
		randomness: U256,
	) -> Result<(), GatewayError> {
		let mut state = self.state()?;
		let mut logs = state
			.fulfill(coordinator, consumer, request_id, randomness)
			.map_err(GatewayError::Reverted)?;
		logs.push(log_of(
			coordinator,
			&IVRFCoordinator::RandomnessRequestFulfilled {
				requestId: request_id,
				output: randomness,
			},
		));
		state.block += 1;
		let block = state.block;
		state.logs.extend(logs.into_iter().map(|log| (block, log)));
		Ok(())
	}
}

#[async_trait]
impl ChainClient for SimulatedChain {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	fn signer_address(&self) -> Address {
		self.signer
	}

	async fn submit(&self, tx: Transaction) -> Result<B256, GatewayError> {
		let mut state = self.state()?;
		let nonce = state.nonce;
		state.nonce += 1;
		state.block += 1;
		let block = state.block;
		let hash = keccak256((self.signer, U256::from(nonce)).abi_encode());

		let (success, contract_address, logs) = match state.execute(self.signer, nonce, &tx) {
			Ok((contract_address, logs)) => (true, contract_address, logs),
			Err(reason) => {
				tracing::debug!(%reason, "Simulated transaction reverted");
				(false, None, Vec::new())
			},
		};
		state
			.logs
			.extend(logs.iter().cloned().map(|log| (block, log)));
		state.receipts.insert(
			hash,
			TransactionReceipt {
				hash,
				block_number: block,
				success,
				contract_address,
				logs,
			},
		);
		Ok(hash)
	}

	async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
		Ok(self.state()?.receipts.get(&hash).cloned())
	}

	async fn call(&self, tx: Transaction) -> Result<Bytes, GatewayError> {
		self.state()?
			.view(&tx)
			.map(Bytes::from)
			.map_err(GatewayError::Reverted)
	}

	async fn get_block_number(&self) -> Result<u64, GatewayError> {
		Ok(self.state()?.block)
	}

	async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>, GatewayError> {
		Ok(self
			.state()?
			.logs
			.iter()
			.filter(|(block, log)| *block >= query.from_block && query.matches(log))
			.map(|(_, log)| log.clone())
			.collect())
	}
}
