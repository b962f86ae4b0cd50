use nestplan_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

/// Best-effort tracing setup from the effective config. Commands surface
/// configuration problems themselves, so a broken config just means no
/// subscriber here.
pub fn try_init() {
    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // Already-initialized is fine in tests and repeated calls.
    let _ = result;
}
