//! Route definitions.
//!
//! # Responsibilities
//! - Bind methods + compiled pattern to a controller reference
//! - Carry route-level middleware, segment defaults and requirements
//! - Validate everything at construction so dispatch never sees a bad route
//!
//! # Design Decisions
//! - Plain serializable data; the controller is an opaque reference resolved
//!   by the host at dispatch time
//! - Methods are stored uppercase in a sorted set (`GET` implies `HEAD`)
//! - The name can be assigned exactly once

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::pipeline::blueprint::MiddlewareBlueprint;
use crate::routing::error::DefinitionError;
use crate::routing::pattern::{path_segments, CompiledPattern};

/// Methods accepted by `Route::any`.
pub const ANY_METHODS: [&str; 7] = ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Opaque reference to a controller action, e.g. `UserController@show`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerRef {
    pub controller: String,
    pub action: String,
}

impl ControllerRef {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
        }
    }
}

impl FromStr for ControllerRef {
    type Err = DefinitionError;

    /// Parses `Controller@action`. A bare `Controller` targets `__invoke`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (controller, action) = s.split_once('@').unwrap_or((s, "__invoke"));
        if controller.is_empty() || action.is_empty() {
            return Err(DefinitionError::InvalidController(s.to_string()));
        }
        Ok(Self::new(controller, action))
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.controller, self.action)
    }
}

/// Constraint a segment value must satisfy for the route to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Numeric,
    Alpha,
    AlphaNumeric,
    OneOf(Vec<String>),
}

impl Requirement {
    pub fn is_satisfied_by(&self, value: &str) -> bool {
        match self {
            Requirement::Numeric => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
            Requirement::Alpha => !value.is_empty() && value.chars().all(char::is_alphabetic),
            Requirement::AlphaNumeric => {
                !value.is_empty() && value.chars().all(char::is_alphanumeric)
            }
            Requirement::OneOf(allowed) => allowed.iter().any(|a| a == value),
        }
    }
}

/// A named binding of methods + pattern to a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    name: Option<String>,
    methods: BTreeSet<String>,
    pattern: CompiledPattern,
    controller: ControllerRef,
    #[serde(default)]
    middleware: Vec<MiddlewareBlueprint>,
    #[serde(default)]
    defaults: BTreeMap<String, String>,
    #[serde(default)]
    requirements: BTreeMap<String, Requirement>,
}

impl Route {
    /// Create a route, compiling the pattern immediately.
    pub fn new<I, S>(methods: I, pattern: &str, controller: ControllerRef) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for method in methods {
            let upper = method.as_ref().trim().to_ascii_uppercase();
            Method::from_bytes(upper.as_bytes())
                .map_err(|_| DefinitionError::InvalidMethod(method.as_ref().to_string()))?;
            set.insert(upper);
        }
        if set.is_empty() {
            return Err(DefinitionError::InvalidMethod(String::new()));
        }
        if set.contains("GET") {
            set.insert("HEAD".to_string());
        }

        Ok(Self {
            name: None,
            methods: set,
            pattern: CompiledPattern::compile(pattern)?,
            controller,
            middleware: Vec::new(),
            defaults: BTreeMap::new(),
            requirements: BTreeMap::new(),
        })
    }

    pub fn get(pattern: &str, controller: ControllerRef) -> Result<Self, DefinitionError> {
        Self::new(["GET"], pattern, controller)
    }

    pub fn post(pattern: &str, controller: ControllerRef) -> Result<Self, DefinitionError> {
        Self::new(["POST"], pattern, controller)
    }

    pub fn any(pattern: &str, controller: ControllerRef) -> Result<Self, DefinitionError> {
        Self::new(ANY_METHODS, pattern, controller)
    }

    /// Assign the route name. Fails if one is already set.
    pub fn named(mut self, name: impl Into<String>) -> Result<Self, DefinitionError> {
        self.assign_name(name)?;
        Ok(self)
    }

    pub(crate) fn assign_name(&mut self, name: impl Into<String>) -> Result<(), DefinitionError> {
        if let Some(existing) = &self.name {
            return Err(DefinitionError::NameAlreadyAssigned(existing.clone()));
        }
        self.name = Some(name.into());
        Ok(())
    }

    /// Append a middleware declaration such as `"auth"` or `"can:edit,posts"`.
    pub fn middleware(mut self, declaration: &str) -> Result<Self, DefinitionError> {
        self.middleware.push(declaration.parse()?);
        Ok(self)
    }

    /// Default value used when an optional segment is absent.
    pub fn with_default(
        mut self,
        segment: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, DefinitionError> {
        let segment = segment.into();
        self.check_segment(&segment)?;
        self.defaults.insert(segment, value.into());
        Ok(self)
    }

    /// Constrain the values a segment accepts.
    pub fn require(
        mut self,
        segment: impl Into<String>,
        requirement: Requirement,
    ) -> Result<Self, DefinitionError> {
        let segment = segment.into();
        self.check_segment(&segment)?;
        self.requirements.insert(segment, requirement);
        Ok(self)
    }

    fn check_segment(&self, segment: &str) -> Result<(), DefinitionError> {
        if self.pattern.has_segment(segment) {
            Ok(())
        } else {
            Err(DefinitionError::UnknownSegment {
                pattern: self.pattern.as_str().to_string(),
                segment: segment.to_string(),
            })
        }
    }

    /// Re-check invariants; used after deserialization.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.defaults
            .keys()
            .chain(self.requirements.keys())
            .try_for_each(|segment| self.check_segment(segment))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name derived from methods and pattern, used when none was assigned.
    pub fn generated_name(&self) -> String {
        let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
        format!("{}:{}", methods.join("|"), self.pattern.as_str())
    }

    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.contains(&method.to_ascii_uppercase())
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn controller(&self) -> &ControllerRef {
        &self.controller
    }

    pub fn middleware_list(&self) -> &[MiddlewareBlueprint] {
        &self.middleware
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    pub fn requirements(&self) -> &BTreeMap<String, Requirement> {
        &self.requirements
    }

    /// Match a raw request path, ignoring the method.
    ///
    /// Returns decoded segment values merged over the defaults.
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        self.match_segments(&path_segments(path))
    }

    pub(crate) fn match_segments(&self, segments: &[String]) -> Option<BTreeMap<String, String>> {
        let captures = self.pattern.match_segments(segments)?;

        for (name, value) in &captures {
            if let Some(req) = self.requirements.get(name) {
                if !req.is_satisfied_by(value) {
                    return None;
                }
            }
        }

        let mut values = self.defaults.clone();
        values.extend(captures);
        Some(values)
    }
}
