//! Interval parsing shared by the server and agent command lines.

use std::time::Duration;

/// Parses `500ms`, `2s`, `5m`, `1h`, or a bare integer of seconds.
///
/// Returns a `String` error so it can be used directly as a clap
/// `value_parser`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    if digits.is_empty() {
        return Err(format!("invalid duration '{}': expected a number", input));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|e| format!("invalid duration '{}': {}", input, e))?;
    match unit {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(amount.saturating_mul(3600))),
        other => Err(format!("invalid duration '{}': unknown unit '{}'", input, other)),
    }
}
