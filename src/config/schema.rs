//! Configuration schema definitions.
//!
//! This module defines the router configuration and the route definition
//! file. All types derive Serde traits for deserialization from TOML.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::blueprint::MiddlewareBlueprint;
use crate::pipeline::priority::MiddlewareResolver;
use crate::routing::collection::RouteCollection;
use crate::routing::error::DefinitionError;
use crate::routing::generator::UrlGenerationContext;
use crate::routing::route::{ControllerRef, Requirement, Route};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Scheme, host and trailing slash policy for generated URLs.
    pub url: UrlConfig,

    /// Signed URL secret, defaults and storage.
    pub signing: SigningConfig,

    /// Middleware priority, global lists and groups.
    pub middleware: MiddlewareConfig,

    /// Admin-area URL rewriting.
    pub admin_area: AdminAreaConfig,

    /// Compiled route cache location.
    pub cache: CacheConfig,

    pub logging: LoggingConfig,
}

/// URL generation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UrlConfig {
    pub scheme: String,
    pub host: String,
    /// Append `/` to generated paths outside the admin area.
    pub trailing_slash: bool,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: "localhost".to_string(),
            trailing_slash: false,
        }
    }
}

impl UrlConfig {
    pub fn context(&self) -> UrlGenerationContext {
        UrlGenerationContext::new(&self.scheme, &self.host, self.trailing_slash)
    }
}

/// Where signed URL records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    File,
}

/// Signed URL settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Hex-encoded application secret (at least 16 bytes).
    /// Overridden by `ROUTER_SIGNING_SECRET`.
    pub secret: String,

    /// Default link lifetime in seconds.
    pub lifetime_secs: u64,

    /// Default usage budget.
    pub max_usage: u32,

    /// Garbage collection interval in seconds.
    pub gc_interval_secs: u64,

    pub storage: StorageKind,

    /// Required when `storage = "file"`.
    pub storage_path: Option<PathBuf>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            lifetime_secs: 3600,
            max_usage: 1,
            gc_interval_secs: 300,
            storage: StorageKind::Memory,
            storage_path: None,
        }
    }
}

impl SigningConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

/// Middleware ordering and grouping.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Identifiers in execution order; unlisted ones run last.
    pub priority: Vec<String>,

    /// Declarations run for every matched route.
    pub global: Vec<String>,

    /// Declarations run when no route matched.
    pub routeless: Vec<String>,

    /// Group alias -> member declarations.
    pub groups: BTreeMap<String, Vec<String>>,
}

fn parse_declarations(list: &[String]) -> Result<Vec<MiddlewareBlueprint>, DefinitionError> {
    list.iter().map(|s| s.parse()).collect()
}

impl MiddlewareConfig {
    pub fn global_blueprints(&self) -> Result<Vec<MiddlewareBlueprint>, DefinitionError> {
        parse_declarations(&self.global)
    }

    pub fn routeless_blueprints(&self) -> Result<Vec<MiddlewareBlueprint>, DefinitionError> {
        parse_declarations(&self.routeless)
    }

    /// Build the group/priority resolver. Fails on bad declarations or group cycles.
    pub fn resolver(&self) -> Result<MiddlewareResolver, DefinitionError> {
        let mut groups = HashMap::new();
        for (name, members) in &self.groups {
            groups.insert(name.clone(), parse_declarations(members)?);
        }
        MiddlewareResolver::new(self.priority.iter().cloned(), groups)
    }
}

/// Admin area configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminAreaConfig {
    pub enabled: bool,

    /// Path prefix of the admin area (e.g. "/wp-admin").
    pub prefix: String,

    /// Script that serves admin pages (e.g. "admin.php").
    pub script: String,
}

impl Default for AdminAreaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: "/wp-admin".to_string(),
            script: "admin.php".to_string(),
        }
    }
}

/// Route cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Load routes from this artifact instead of the definition file.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Route definition file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteFile {
    pub routes: Vec<RouteDefinition>,
}

/// One route as written in the definition file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteDefinition {
    /// Omitted names are generated from methods and pattern.
    pub name: Option<String>,

    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    pub pattern: String,

    /// `Controller@action`.
    pub controller: String,

    #[serde(default)]
    pub middleware: Vec<String>,

    #[serde(default)]
    pub defaults: BTreeMap<String, String>,

    #[serde(default)]
    pub requirements: BTreeMap<String, Requirement>,
}

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

impl RouteDefinition {
    pub fn build(&self) -> Result<Route, DefinitionError> {
        let controller: ControllerRef = self.controller.parse()?;
        let mut route = Route::new(&self.methods, &self.pattern, controller)?;
        if let Some(name) = &self.name {
            route = route.named(name)?;
        }
        for declaration in &self.middleware {
            route = route.middleware(declaration)?;
        }
        for (segment, value) in &self.defaults {
            route = route.with_default(segment, value)?;
        }
        for (segment, requirement) in &self.requirements {
            route = route.require(segment, requirement.clone())?;
        }
        Ok(route)
    }
}

impl RouteFile {
    /// Build and freeze a collection in file order.
    pub fn into_collection(self) -> Result<RouteCollection, DefinitionError> {
        let mut collection = RouteCollection::new();
        for definition in &self.routes {
            collection.add(definition.build()?)?;
        }
        collection.freeze();
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::collection::RouteSource;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert_eq!(config.url.scheme, "https");
        assert_eq!(config.signing.max_usage, 1);
        assert_eq!(config.admin_area.prefix, "/wp-admin");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_route_file_builds_collection() {
        let file: RouteFile = toml::from_str(
            r#"
            [[routes]]
            name = "posts.show"
            pattern = "/posts/{id}/{slug?}"
            controller = "Posts@show"
            middleware = ["auth", "can:read,posts"]
            defaults = { slug = "index" }
            requirements = { id = "numeric" }

            [[routes]]
            methods = ["POST"]
            pattern = "/posts"
            controller = "Posts@store"
            "#,
        )
        .unwrap();

        let collection = file.into_collection().unwrap();
        assert!(collection.is_frozen());
        assert_eq!(collection.count(), 2);

        let show = collection.get_by_name("posts.show").unwrap();
        assert_eq!(show.middleware_list().len(), 2);
        assert_eq!(show.requirements()["id"], Requirement::Numeric);
        assert!(collection.get_by_name("POST:/posts").is_ok());
    }

    #[test]
    fn test_route_file_rejects_unknown_default() {
        let file: RouteFile = toml::from_str(
            r#"
            [[routes]]
            pattern = "/a"
            controller = "A"
            defaults = { nope = "1" }
            "#,
        )
        .unwrap();
        assert!(matches!(
            file.into_collection().unwrap_err(),
            DefinitionError::UnknownSegment { .. }
        ));
    }
}
