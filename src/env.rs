//! Typed lookups of environment variables with fallbacks.

use crate::error::{WorkError, WorkResult};
use std::str::FromStr;

/// The raw value of `key`, or `fallback` when unset.
pub fn string(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// `key` parsed as a number, or `fallback` when unset or unparsable.
pub fn int<N: FromStr>(key: &str, fallback: N) -> N {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

/// `key` as a flag, or `fallback` when unset.
pub fn flag(key: &str, fallback: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => parse_bool(&value),
        Err(_) => fallback,
    }
}

/// The value of `key`, failing when it is unset or empty.
pub fn require(key: &str) -> WorkResult<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(WorkError::config(format!(
            "required env var missing or empty: {key}"
        ))),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value,
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "on" | "ON"
    )
}
