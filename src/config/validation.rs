//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges (lifetimes > 0, usage budgets >= 1)
//! - Check middleware declarations parse and groups are acyclic
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{RouterConfig, StorageKind};
use crate::signing::signer::SigningSecret;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !matches!(config.url.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new("url.scheme", "must be http or https"));
    }
    if config.url.host.trim().is_empty() || config.url.host.contains('/') {
        errors.push(ValidationError::new("url.host", "must be a bare host name"));
    }

    let signing = &config.signing;
    if let Err(e) = SigningSecret::from_hex(&signing.secret) {
        errors.push(ValidationError::new("signing.secret", e.to_string()));
    }
    if signing.lifetime_secs == 0 {
        errors.push(ValidationError::new("signing.lifetime_secs", "must be greater than 0"));
    }
    if signing.max_usage == 0 {
        errors.push(ValidationError::new("signing.max_usage", "must be at least 1"));
    }
    if signing.gc_interval_secs == 0 {
        errors.push(ValidationError::new("signing.gc_interval_secs", "must be greater than 0"));
    }
    if signing.storage == StorageKind::File && signing.storage_path.is_none() {
        errors.push(ValidationError::new(
            "signing.storage_path",
            "required when storage is \"file\"",
        ));
    }

    let middleware = &config.middleware;
    let mut seen = HashSet::new();
    for id in &middleware.priority {
        if !seen.insert(id) {
            errors.push(ValidationError::new(
                "middleware.priority",
                format!("`{}` is listed twice", id),
            ));
        }
    }
    if let Err(e) = middleware.global_blueprints() {
        errors.push(ValidationError::new("middleware.global", e.to_string()));
    }
    if let Err(e) = middleware.routeless_blueprints() {
        errors.push(ValidationError::new("middleware.routeless", e.to_string()));
    }
    if let Err(e) = middleware.resolver() {
        errors.push(ValidationError::new("middleware.groups", e.to_string()));
    }

    if config.admin_area.enabled {
        if !config.admin_area.prefix.starts_with('/') {
            errors.push(ValidationError::new("admin_area.prefix", "must start with '/'"));
        }
        if config.admin_area.script.is_empty() || config.admin_area.script.contains('/') {
            errors.push(ValidationError::new("admin_area.script", "must be a file name"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
