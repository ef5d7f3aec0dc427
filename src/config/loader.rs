//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{RouteFile, RouterConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `signing.secret`.
pub const SECRET_ENV: &str = "ROUTER_SIGNING_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parse configuration from TOML text, apply env overrides, validate.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let mut config: RouterConfig = toml::from_str(content)?;

    if let Ok(secret) = std::env::var(SECRET_ENV) {
        if !secret.is_empty() {
            config.signing.secret = secret;
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load a route definition file.
pub fn load_routes(path: &Path) -> Result<RouteFile, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
