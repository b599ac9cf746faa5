//! Storage module for the random SVG minter.
//!
//! Mint requests are persisted on every state transition so that a workflow
//! interrupted while waiting for the oracle can be resumed at `finalize`
//! after a restart. Backends implement a small byte-level key-value
//! interface; `StorageService` adds JSON (de)serialization and namespacing.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface for storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all keys starting with `prefix`, in no particular order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Get all storage implementations as `(config name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		("file", file::create_storage as StorageFactory),
		("memory", memory::create_storage as StorageFactory),
	]
}

/// Creates the backend registered under `name`.
pub fn create_backend(
	name: &str,
	config: &toml::Value,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	let (_, factory) = get_all_implementations()
		.into_iter()
		.find(|(impl_name, _)| *impl_name == name)
		.ok_or_else(|| {
			StorageError::Configuration(format!("Unknown storage implementation '{}'", name))
		})?;
	factory(config)
}

/// High-level storage service that provides typed operations.
///
/// Keys are formed as `namespace:id`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Updates an existing value, failing with `NotFound` if it is absent.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		if !self.backend.exists(&Self::key(namespace, id)).await? {
			return Err(StorageError::NotFound);
		}
		self.store(namespace, id, data).await
	}

	/// Retrieves every value in a namespace.
	///
	/// Entries that fail to deserialize are skipped with a warning so that one
	/// corrupt record cannot block recovery of the others.
	pub async fn list<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let mut values = Vec::new();

		for key in self.backend.list_keys(&prefix).await? {
			let bytes = match self.backend.get_bytes(&key).await {
				Ok(bytes) => bytes,
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			};
			match serde_json::from_slice(&bytes) {
				Ok(value) => values.push(value),
				Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable entry"),
			}
		}

		Ok(values)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Entry {
		token_id: u64,
	}

	#[tokio::test]
	async fn test_update_requires_existing() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));

		let result = service.update("mints", "a", &Entry { token_id: 1 }).await;
		assert!(matches!(result, Err(StorageError::NotFound)));

		service.store("mints", "a", &Entry { token_id: 1 }).await.unwrap();
		service.update("mints", "a", &Entry { token_id: 2 }).await.unwrap();

		let entry: Entry = service.retrieve("mints", "a").await.unwrap();
		assert_eq!(entry, Entry { token_id: 2 });
	}

	#[tokio::test]
	async fn test_list_is_namespaced() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		service.store("mints", "a", &Entry { token_id: 1 }).await.unwrap();
		service.store("mints", "b", &Entry { token_id: 2 }).await.unwrap();
		service.store("other", "c", &Entry { token_id: 3 }).await.unwrap();

		let mut entries: Vec<Entry> = service.list("mints").await.unwrap();
		entries.sort_by_key(|e| e.token_id);
		assert_eq!(entries, vec![Entry { token_id: 1 }, Entry { token_id: 2 }]);
	}

	#[test]
	fn test_unknown_backend_rejected() {
		let config = toml::Value::Table(Default::default());
		assert!(matches!(
			create_backend("redis", &config),
			Err(StorageError::Configuration(_))
		));
		assert!(create_backend("memory", &config).is_ok());
	}
}
