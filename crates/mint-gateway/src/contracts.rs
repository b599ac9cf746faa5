//! Typed bindings for the contracts the minter drives.

use crate::{ContractHandle, GatewayError};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolValue};
use mint_types::TransactionReceipt;

sol! {
	/// Randomly generated SVG NFT, a VRF consumer.
	#[derive(Debug, PartialEq, Eq)]
	interface IRandomSVG {
		function create() external payable returns (bytes32 requestId);
		function finishMint(uint256 tokenId) external;
		function tokenURI(uint256 tokenId) external view returns (string memory);
		function tokenCounter() external view returns (uint256);

		event requestedRandomSVG(bytes32 indexed requestId, uint256 indexed tokenId);
		event CreatedUnfinishedRandomSVG(uint256 indexed tokenId, uint256 randomNumber);
		event CreatedRandomSVG(uint256 indexed tokenId, string tokenURI);
	}

	/// Local stand-in for the VRF coordinator.
	#[derive(Debug, PartialEq, Eq)]
	interface IVRFCoordinatorMock {
		function callBackWithRandomness(bytes32 requestId, uint256 randomness, address consumerContract) external;

		event RandomnessRequest(address indexed sender, bytes32 indexed keyHash, uint256 indexed seed);
	}

	/// Event emitted by the live coordinator once a request is fulfilled.
	#[derive(Debug, PartialEq, Eq)]
	interface IVRFCoordinator {
		event RandomnessRequestFulfilled(bytes32 requestId, uint256 output);
	}

	/// ERC-677 fee token used to pay the oracle.
	#[derive(Debug, PartialEq, Eq)]
	interface ILinkToken {
		function transfer(address to, uint256 value) external returns (bool success);
		function balanceOf(address owner) external view returns (uint256 balance);

		event Transfer(address indexed from, address indexed to, uint256 value);
	}
}

/// The NFT contract.
#[derive(Clone)]
pub struct RandomSvg {
	handle: ContractHandle,
}

impl RandomSvg {
	pub const NAME: &'static str = "RandomSVG";

	pub fn new(handle: ContractHandle) -> Self {
		Self { handle }
	}

	pub fn address(&self) -> Address {
		self.handle.address()
	}

	/// ABI-encoded constructor arguments.
	pub fn constructor_args(
		vrf_coordinator: Address,
		link_token: Address,
		key_hash: B256,
		fee: U256,
	) -> Vec<u8> {
		(vrf_coordinator, link_token, key_hash, fee).abi_encode_params()
	}

	/// Requests a new token. The receipt carries the commit events.
	pub async fn create(
		&self,
		value: U256,
		gas_limit: Option<u64>,
	) -> Result<TransactionReceipt, GatewayError> {
		self.handle
			.transact(&IRandomSVG::createCall {}, value, gas_limit)
			.await
	}

	pub async fn finish_mint(
		&self,
		token_id: U256,
		gas_limit: Option<u64>,
	) -> Result<TransactionReceipt, GatewayError> {
		self.handle
			.transact(
				&IRandomSVG::finishMintCall { tokenId: token_id },
				U256::ZERO,
				gas_limit,
			)
			.await
	}

	pub async fn token_uri(&self, token_id: U256) -> Result<String, GatewayError> {
		let result = self
			.handle
			.read(&IRandomSVG::tokenURICall { tokenId: token_id })
			.await?;
		Ok(result._0)
	}

	/// Number of tokens reserved so far.
	pub async fn token_counter(&self) -> Result<U256, GatewayError> {
		Ok(self
			.handle
			.read(&IRandomSVG::tokenCounterCall {})
			.await?
			._0)
	}
}

/// The mock VRF coordinator deployed on simulated networks.
#[derive(Clone)]
pub struct VrfCoordinatorMock {
	handle: ContractHandle,
}

impl VrfCoordinatorMock {
	pub const NAME: &'static str = "VRFCoordinatorMock";

	pub fn new(handle: ContractHandle) -> Self {
		Self { handle }
	}

	pub fn handle(&self) -> &ContractHandle {
		&self.handle
	}

	pub fn address(&self) -> Address {
		self.handle.address()
	}

	pub fn constructor_args(link_token: Address) -> Vec<u8> {
		link_token.abi_encode()
	}

	/// Delivers `randomness` for `request_id` to `consumer`.
	pub async fn call_back_with_randomness(
		&self,
		request_id: B256,
		randomness: U256,
		consumer: Address,
	) -> Result<TransactionReceipt, GatewayError> {
		self.handle
			.transact(
				&IVRFCoordinatorMock::callBackWithRandomnessCall {
					requestId: request_id,
					randomness,
					consumerContract: consumer,
				},
				U256::ZERO,
				None,
			)
			.await
	}
}

/// The oracle fee token.
#[derive(Clone)]
pub struct LinkToken {
	handle: ContractHandle,
}

impl LinkToken {
	pub const NAME: &'static str = "LinkToken";

	pub fn new(handle: ContractHandle) -> Self {
		Self { handle }
	}

	pub fn address(&self) -> Address {
		self.handle.address()
	}

	pub async fn transfer(
		&self,
		to: Address,
		amount: U256,
	) -> Result<TransactionReceipt, GatewayError> {
		self.handle
			.transact(
				&ILinkToken::transferCall { to, value: amount },
				U256::ZERO,
				None,
			)
			.await
	}

	pub async fn balance_of(&self, owner: Address) -> Result<U256, GatewayError> {
		Ok(self
			.handle
			.read(&ILinkToken::balanceOfCall { owner })
			.await?
			.balance)
	}
}
