//! Route cache artifact persistence.
//!
//! # Responsibilities
//! - Serialize a frozen collection into a `name -> serialized route` JSON map
//! - Write the artifact by whole-file replacement (temp file + rename)
//! - Load the artifact, checking only its top-level shape; entries are
//!   verified lazily by `CachedRouteCollection`
//!
//! # Design Decisions
//! - The artifact is never modified in place while other processes may be
//!   reading it
//! - Per-entry values are JSON strings, not nested objects, so a single
//!   entry can be hydrated without touching the others

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use crate::routing::collection::{CachedRouteCollection, RouteSource};
use crate::routing::error::{CacheCorrupted, RoutingResult};

/// Build the in-memory cache map for a collection.
pub fn to_cache_map(routes: &dyn RouteSource) -> RoutingResult<Map<String, Value>> {
    let mut map = Map::new();
    for route in routes.iter() {
        let route = route?;
        let name = route.name().unwrap_or_default().to_string();
        let serialized = serde_json::to_string(route.as_ref()).map_err(|e| {
            CacheCorrupted::InvalidEntry {
                key: name.clone(),
                reason: e.to_string(),
            }
        })?;
        map.insert(name, Value::String(serialized));
    }
    Ok(map)
}

/// Turn a loaded JSON value into a cached collection, validating its shape.
pub fn from_cache_value(value: Value) -> RoutingResult<CachedRouteCollection> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(CacheCorrupted::InvalidShape(format!(
                "expected an object of serialized routes, found {}",
                json_kind(&other)
            ))
            .into())
        }
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::String(serialized) => entries.push((key, serialized)),
            other => {
                return Err(CacheCorrupted::InvalidEntry {
                    reason: format!("expected a serialized route string, found {}", json_kind(&other)),
                    key,
                }
                .into())
            }
        }
    }
    Ok(CachedRouteCollection::new(entries))
}

/// Write the cache artifact for `routes` to `path`.
pub fn write_cache(path: &Path, routes: &dyn RouteSource) -> RoutingResult<()> {
    let map = to_cache_map(routes)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "routes".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &map).map_err(std::io::Error::from)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::info!(path = %path.display(), routes = map.len(), "Route cache written");
    Ok(())
}

/// Load a cache artifact from `path`.
pub fn load_cache(path: &Path) -> RoutingResult<CachedRouteCollection> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CacheCorrupted::InvalidShape(format!("unreadable artifact: {}", e)))?;
    let routes = from_cache_value(value)?;

    tracing::info!(path = %path.display(), routes = routes.count(), "Route cache loaded");
    Ok(routes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
