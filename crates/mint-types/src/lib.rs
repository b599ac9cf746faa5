//! Common types for the random SVG minter.
//!
//! This crate holds the data model shared by every other crate in the
//! workspace: mint requests and their lifecycle, oracle callbacks, network
//! profiles, and the chain-agnostic transaction and receipt shapes used by
//! the contract gateway.

/// Transaction, receipt and log query types for chain interactions.
pub mod delivery;
/// Mint request lifecycle types.
pub mod mint;
/// Network profile registry types.
pub mod networks;
/// Redacting wrapper for sensitive strings.
pub mod secret_string;
/// Storage namespaces.
pub mod storage;
/// Formatting and time helpers.
pub mod utils;

pub use delivery::*;
pub use mint::*;
pub use networks::{NetworkProfile, NetworksConfig};
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{current_timestamp, format_token_amount, truncate_id, with_0x_prefix};

pub use alloy_primitives::{Address, Bytes, B256, U256};
