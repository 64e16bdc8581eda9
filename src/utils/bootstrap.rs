//! Process bootstrap helpers.
//!
//! Shared initialization for binaries and services embedding kpiscope.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Log filter from KPISCOPE_LOG, defaulting to "info".
pub fn tracing_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with KPISCOPE_LOG environment variable.
///
/// Defaults to "info" level if KPISCOPE_LOG is not set. Does nothing if a
/// global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_filter_defaults_to_info() {
        std::env::remove_var(LOG_ENV_VAR);
        assert_eq!(tracing_filter().to_string(), "info");
    }

    #[test]
    #[serial]
    fn test_filter_reads_env() {
        std::env::set_var(LOG_ENV_VAR, "kpiscope=debug");
        let filter = tracing_filter().to_string();
        std::env::remove_var(LOG_ENV_VAR);
        assert_eq!(filter, "kpiscope=debug");
    }

    #[test]
    #[serial]
    fn test_init_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
