//! Formatting and time helpers used in log output.

/// Truncates a hex identifier for display, keeping the first 10 characters.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Adds a "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Formats a raw token amount with the given number of decimals,
/// e.g. `("100000000000000000", 18)` becomes `"0.1"`.
pub fn format_token_amount(amount: &str, decimals: u8) -> String {
	let decimals = decimals as usize;
	if decimals == 0 {
		return amount.to_string();
	}

	let padded = format!("{:0>width$}", amount, width = decimals + 1);
	let (integer, fraction) = padded.split_at(padded.len() - decimals);
	let fraction = fraction.trim_end_matches('0');

	if fraction.is_empty() {
		integer.to_string()
	} else {
		format!("{}.{}", integer, fraction)
	}
}

/// Current Unix timestamp in seconds, or 0 if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
