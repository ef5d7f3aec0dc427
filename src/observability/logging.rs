//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber for binaries
//! - Honor `RUST_LOG` before the configured level
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Installing twice is reported, not fatal

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, LoggingConfig};

/// Install the global subscriber described by `config`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cms_router={},route_cache={}", config.level, config.level)));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    result.is_ok()
}
