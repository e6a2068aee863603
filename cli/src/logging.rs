//! Logging setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Resolve level and format: command-line flags win over the config file
pub fn resolve(settings: &LoggingSettings, level: Option<&str>, json: bool) -> (String, bool) {
    let level = level.unwrap_or(&settings.level).to_string();
    (level, json || settings.format.eq_ignore_ascii_case("json"))
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false).compact()).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}
