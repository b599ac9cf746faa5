//! Storage-related types for the minter.

use std::str::FromStr;

/// Storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Persisted mint requests
	Mints,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Mints => "mints",
		}
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"mints" => Ok(Self::Mints),
			_ => Err(()),
		}
	}
}
