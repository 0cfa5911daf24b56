//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Map the configured level to a filter, letting `RUST_LOG` override it
//!
//! # Design Decisions
//! - Logs go to stderr; stdout carries only the listen announcement
//! - Dependency noise (hyper, reqwest) is capped at warn unless asked for

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directives for a configured level name.
pub fn filter_directives(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    format!("{level},hyper=warn,hyper_util=warn,reqwest=warn")
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.log_level)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
    if let Err(e) = result {
        eprintln!("meek-http-helper: logging already initialized: {e}");
    }
}
