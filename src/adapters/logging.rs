//! Console logging via `tracing-subscriber`.
//!
//! Level precedence: `RUST_LOG`, then `[logging] level`, then `info`.
//! Output goes to stderr so command output on stdout stays clean.

use crate::ports::config_port::ConfigPort;
use tracing_subscriber::fmt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub filter: String,
}

impl LoggingConfig {
    pub fn resolve(env_filter: Option<String>, config: &dyn ConfigPort) -> Self {
        let filter = env_filter
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .or_else(|| {
                config
                    .get_string("logging", "level")
                    .map(|level| level.trim().to_lowercase())
            })
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        Self { filter }
    }

    pub fn from_env(config: &dyn ConfigPort) -> Self {
        Self::resolve(std::env::var("RUST_LOG").ok(), config)
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
