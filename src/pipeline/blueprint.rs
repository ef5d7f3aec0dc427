//! Middleware blueprints.
//!
//! A blueprint is the plain, serializable description of a middleware:
//! an identifier plus string constructor arguments. Arguments are only
//! coerced into typed values when the factory resolves the blueprint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::routing::error::DefinitionError;

/// Identifier + raw constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MiddlewareBlueprint {
    pub id: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl MiddlewareBlueprint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(id: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments coerced to typed values.
    pub fn coerced_args(&self) -> Vec<MiddlewareArg> {
        self.args.iter().map(|a| MiddlewareArg::coerce(a)).collect()
    }
}

impl FromStr for MiddlewareBlueprint {
    type Err = DefinitionError;

    /// Parses `id` or `id:arg1,arg2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DefinitionError::InvalidMiddleware(s.to_string());
        let (id, args) = match s.split_once(':') {
            Some((id, args)) => (id.trim(), Some(args)),
            None => (s.trim(), None),
        };
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let args = match args {
            Some(raw) => {
                let args: Vec<String> = raw.split(',').map(|a| a.trim().to_string()).collect();
                if args.iter().any(String::is_empty) {
                    return Err(invalid());
                }
                args
            }
            None => Vec::new(),
        };
        Ok(Self::with_args(id, args))
    }
}

impl fmt::Display for MiddlewareBlueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}:{}", self.id, self.args.join(","))
        }
    }
}

/// A constructor argument after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareArg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MiddlewareArg {
    /// `"true"`/`"false"` become booleans, numeric strings become numbers,
    /// everything else stays a string.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => return MiddlewareArg::Bool(true),
            "false" => return MiddlewareArg::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return MiddlewareArg::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return MiddlewareArg::Float(f);
            }
        }
        MiddlewareArg::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MiddlewareArg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MiddlewareArg::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MiddlewareArg::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for MiddlewareArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareArg::Bool(b) => write!(f, "{}", b),
            MiddlewareArg::Int(i) => write!(f, "{}", i),
            MiddlewareArg::Float(x) => write!(f, "{}", x),
            MiddlewareArg::Str(s) => f.write_str(s),
        }
    }
}
