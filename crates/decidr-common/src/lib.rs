//! Shared utilities for Decidr: logging, error types, relay framing.
//!
//! This crate provides common infrastructure used by the relay and the
//! endpoint binaries.

#![forbid(unsafe_code)]

pub mod error;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::{encode_targeted, split_targeted, HealthReport};

/// Initialize tracing.
///
/// `RUST_LOG` wins when set; otherwise `default_level` is used.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Read a numeric tunable from the environment, falling back to `default`
/// when unset or unparsable.
pub fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Read a boolean flag from the environment.
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_usize_fallback() {
        assert_eq!(env_usize("DECIDR_TEST_SURELY_UNSET_USIZE", 42), 42);
    }

    #[test]
    fn test_env_bool_fallback() {
        assert!(env_bool("DECIDR_TEST_SURELY_UNSET_BOOL", true));
        assert!(!env_bool("DECIDR_TEST_SURELY_UNSET_BOOL", false));
    }
}
