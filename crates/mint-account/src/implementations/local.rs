//! Local private-key account.

use crate::{AccountError, AccountInterface};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use mint_types::{with_0x_prefix, Address, SecretString};

/// Account backed by a private key held in memory.
pub struct LocalAccount {
	signer: PrivateKeySigner,
	private_key: SecretString,
}

impl LocalAccount {
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key.with_exposed(|key| {
			key.parse()
				.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))
		})?;
		let private_key = private_key.with_exposed(|key| SecretString::new(with_0x_prefix(key)));

		Ok(Self {
			signer,
			private_key,
		})
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}
}

/// Factory function to create a local account.
///
/// Configuration parameters:
/// - `private_key` (required): hex-encoded secp256k1 key
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	Ok(Box::new(LocalAccount::new(&SecretString::from(private_key))?))
}
