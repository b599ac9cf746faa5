//! Mint orchestration for randomly generated SVG NFTs.
//!
//! This crate drives the two-phase mint: commit a request to the mint
//! contract, wait for the randomness oracle to call back, then finalize the
//! token and read its URI. It also holds the deploy-time helpers that resolve
//! the network environment and fund the contract with the oracle fee.

pub mod builder;
pub mod environment;
pub mod error;
pub mod funding;
pub mod orchestrator;
pub mod randomness;
pub mod receipt;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{BuilderError, MinterBuilder};
pub use environment::{EnvironmentError, NetworkEnvironment};
pub use error::{MintError, WorkflowFailure};
pub use funding::{FundingError, FundingStep};
pub use orchestrator::{MintOrchestrator, MintSettings};
pub use randomness::{LiveSource, RandomnessSource, SimulatedSource};
pub use receipt::{CommitEvent, CommitEventLayout};
pub use state::{MintStateError, MintStateMachine};
