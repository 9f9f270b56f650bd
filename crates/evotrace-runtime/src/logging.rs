//! Structured logging setup. Opt-in: hosts embedding `evotrace-runtime`
//! inside their own process are expected to configure `tracing` themselves
//! most of the time, so this only installs a subscriber when asked.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub json_format: bool,
    pub default_level: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self { json_format: false, default_level: "info".to_string() }
    }
}

/// Installs a global `tracing` subscriber honoring `RUST_LOG`, falling back
/// to `options.default_level`. A no-op, not an error, if a subscriber is
/// already installed (the host's own, or an earlier call to this function).
pub fn install_default_logging(options: LoggingOptions) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.default_level));

    let result = if options.json_format {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer().json()).try_init()
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed, skipping");
    }
}
