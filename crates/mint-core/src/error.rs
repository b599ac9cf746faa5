//! Errors raised while driving a mint.

use crate::state::MintStateError;
use mint_gateway::GatewayError;
use mint_types::{MintRequest, B256};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a mint.
#[derive(Debug, Error)]
pub enum MintError {
	/// The commit transaction reverted or was never mined.
	#[error("Commit failed: {0}")]
	CommitFailed(String),
	/// The commit receipt does not carry the expected event.
	#[error("Malformed receipt: {0}")]
	MalformedReceipt(String),
	/// The oracle did not deliver within the configured window.
	#[error("No randomness for request {request_id} after {waited:?}")]
	OracleTimeout { request_id: B256, waited: Duration },
	/// A callback arrived for the wrong request or was refused by the consumer.
	#[error("Callback rejected: {0}")]
	CallbackRejected(String),
	/// `finishMint` reverted or its result could not be read back.
	#[error("Finalize failed: {0}")]
	FinalizeFailed(String),
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),
	#[error("State error: {0}")]
	State(#[from] MintStateError),
}

/// A mint that was aborted, together with the last state it reached.
///
/// `request` is `None` when the mint failed before a commit receipt could be
/// decoded.
#[derive(Debug)]
pub struct WorkflowFailure {
	pub request: Option<MintRequest>,
	pub error: MintError,
}

impl WorkflowFailure {
	pub fn new(request: Option<MintRequest>, error: MintError) -> Self {
		Self { request, error }
	}
}

impl fmt::Display for WorkflowFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.request {
			Some(request) => write!(f, "mint of {} aborted: {}", request, self.error),
			None => write!(f, "mint aborted before commit: {}", self.error),
		}
	}
}

impl std::error::Error for WorkflowFailure {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.error)
	}
}
