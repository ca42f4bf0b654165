//! `tracing` subscriber setup for binaries built on this crate.
//!
//! The library only emits events; installing a subscriber is left to the program.
//! [`init`] is a convenience for programs that use [`LogConfig`].

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;

use crate::config::LogConfig;

/// Install a global fmt subscriber.
///
/// `RUST_LOG`, when set, overrides `config.level`. A level string that does not parse
/// falls back to `info`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(filter(config))
        .with(tracing_subscriber::fmt::layer().with_ansi(config.ansi))
        .try_init()
}

fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        let config = LogConfig {
            level: "warn".to_owned(),
            ansi: false,
        };
        // Whichever call installs first, the other must be refused.
        let first = init(&config);
        let second = init(&config);
        assert!(first.is_err() || second.is_err());
    }
}
