//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::error::TelemetryError;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when the variable is unset.
///
/// Returns `Ok(false)` when a global subscriber was already installed.
pub fn init(default_filter: &str) -> Result<bool, TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let _ = init("debug");
        assert_eq!(init("debug").ok(), Some(false));
    }
}
