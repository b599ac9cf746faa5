//! Deployment records and compiled artifacts.
//!
//! Deployment records live at `<deployments>/<name>.json` and artifacts at
//! `<artifacts>/<name>.json`. Both follow the layout hardhat tooling writes,
//! so only the fields the minter needs are read and unknown fields are
//! ignored.

use crate::GatewayError;
use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Record of a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
	pub address: Address,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_hash: Option<B256>,
	/// ABI-encoded constructor arguments.
	#[serde(default, skip_serializing_if = "is_empty")]
	pub encoded_args: Bytes,
}

fn is_empty(bytes: &Bytes) -> bool {
	bytes.is_empty()
}

/// Directory of deployment records for one network.
#[derive(Debug, Clone)]
pub struct Deployments {
	path: PathBuf,
}

impl Deployments {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	fn record_path(&self, name: &str) -> PathBuf {
		self.path.join(format!("{}.json", name))
	}

	/// Reads the record for `name`, failing with `NotDeployed` if absent.
	pub async fn get(&self, name: &str) -> Result<Deployment, GatewayError> {
		let data = match fs::read(self.record_path(name)).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(GatewayError::NotDeployed(name.to_string()))
			},
			Err(e) => return Err(GatewayError::Record(format!("{}: {}", name, e))),
		};
		serde_json::from_slice(&data)
			.map_err(|e| GatewayError::Record(format!("Invalid record for {}: {}", name, e)))
	}

	/// Writes the record for `name`, replacing any previous one.
	pub async fn save(&self, name: &str, deployment: &Deployment) -> Result<(), GatewayError> {
		fs::create_dir_all(&self.path)
			.await
			.map_err(|e| GatewayError::Record(e.to_string()))?;
		let data = serde_json::to_vec_pretty(deployment)
			.map_err(|e| GatewayError::Record(e.to_string()))?;
		fs::write(self.record_path(name), data)
			.await
			.map_err(|e| GatewayError::Record(format!("{}: {}", name, e)))
	}
}

#[derive(Deserialize)]
struct Artifact {
	bytecode: String,
}

/// Directory of compiled contract artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
	path: PathBuf,
}

impl ArtifactStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Creation bytecode of `name`.
	pub async fn bytecode(&self, name: &str) -> Result<Bytes, GatewayError> {
		let path = self.path.join(format!("{}.json", name));
		let data = fs::read(&path)
			.await
			.map_err(|e| GatewayError::Artifact(format!("{}: {}", path.display(), e)))?;
		let artifact: Artifact = serde_json::from_slice(&data)
			.map_err(|e| GatewayError::Artifact(format!("{}: {}", path.display(), e)))?;
		let bytecode: Bytes = artifact
			.bytecode
			.parse()
			.map_err(|e| GatewayError::Artifact(format!("Invalid bytecode for {}: {}", name, e)))?;
		if bytecode.is_empty() {
			return Err(GatewayError::Artifact(format!(
				"{} has no bytecode (abstract contract or interface?)",
				name
			)));
		}
		Ok(bytecode)
	}
}
