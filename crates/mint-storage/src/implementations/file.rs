//! File-based storage backend.
//!
//! Each entry is a JSON file at `<storage_path>/<namespace>/<id>.json`.
//! Writes go to a temporary file that is then renamed over the target, so a
//! crash mid-write never leaves a truncated mint record behind.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

const EXTENSION: &str = "json";

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Maps `namespace:id` to `<base>/<namespace>/<id>.json`.
	///
	/// Keys without a namespace land directly under the base path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (dir, id) = match key.split_once(':') {
			Some((namespace, id)) => (self.base_path.join(sanitize(namespace)), id),
			None => (self.base_path.clone(), key),
		};
		dir.join(format!("{}.{}", sanitize(id), EXTENSION))
	}
}

fn sanitize(part: &str) -> String {
	part.replace(['/', '\\', ':'], "_")
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.get_file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let (namespace, id_prefix) = prefix.split_once(':').ok_or_else(|| {
			StorageError::Backend(format!("List prefix '{}' must include a namespace", prefix))
		})?;

		let dir = self.base_path.join(sanitize(namespace));
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new(EXTENSION)) {
				continue;
			}
			match path.file_stem().and_then(|s| s.to_str()) {
				Some(id) if id.starts_with(id_prefix) => {
					keys.push(format!("{}:{}", namespace, id));
				},
				Some(_) => {},
				None => tracing::debug!("Skipping file {:?}: non UTF-8 name", path),
			}
		}

		Ok(keys)
	}
}

/// Factory function to create a file storage backend.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/mints")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = match config.get("storage_path") {
		None => "./data/mints",
		Some(value) => value.as_str().ok_or_else(|| {
			StorageError::Configuration("storage_path must be a string".to_string())
		})?,
	};

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}
