//! Account management for the random SVG minter.
//!
//! The account provides the signing identity that every deploy, fund, commit
//! and finalize transaction is sent from. Key storage itself is out of scope;
//! implementations only expose the address and the key material the chain
//! client needs to build its wallet.

use async_trait::async_trait;
use mint_types::{Address, SecretString};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when interacting with the account implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Interface for account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Returns the private key with a 0x prefix.
	///
	/// Used by the chain client to build its signing wallet.
	fn get_private_key(&self) -> SecretString;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Get all account implementations as `(config name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	vec![(
		"local",
		implementations::local::create_account as AccountFactory,
	)]
}

/// Service wrapping the configured account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Builds the service from the implementation registered under `name`.
	pub fn from_config(name: &str, config: &toml::Value) -> Result<Self, AccountError> {
		let (_, factory) = get_all_implementations()
			.into_iter()
			.find(|(impl_name, _)| *impl_name == name)
			.ok_or_else(|| {
				AccountError::Implementation(format!("Unknown account implementation '{}'", name))
			})?;
		Ok(Self::new(factory(config)?))
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
