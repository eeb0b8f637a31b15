//! Tracing subscriber setup.

use crate::domain::config_validation;
use crate::ports::config_port::ConfigPort;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `[logging] level`.
///
/// Writes to stderr. A second call is a no-op.
pub fn init(config: &dyn ConfigPort) {
    let level = config_validation::log_level(config);
    init_with_level(&level);
}

pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
