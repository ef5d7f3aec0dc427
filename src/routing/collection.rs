//! Route collections.
//!
//! # Responsibilities
//! - Own registered routes, keyed by unique name, in registration order
//! - Freeze before the first request is dispatched
//! - Hydrate cached routes lazily and refuse to trust corrupted entries
//!
//! # Design Decisions
//! - Routes are handed out as `Arc<Route>` so the matcher and generator
//!   share them without copying
//! - The cached variant memoizes hydration in a per-entry `OnceLock`, so a
//!   frozen collection can be shared across threads without locking
//! - A corrupted entry aborts iteration instead of being skipped

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::routing::error::{CacheCorrupted, DefinitionError, RoutingError, RoutingResult};
use crate::routing::route::Route;

/// Read access shared by the in-memory and cached collections.
pub trait RouteSource: Send + Sync {
    /// Look up a route by name.
    fn get_by_name(&self, name: &str) -> RoutingResult<Arc<Route>>;

    /// Routes in registration order. The iterator stops after the first error.
    fn iter(&self) -> Box<dyn Iterator<Item = RoutingResult<Arc<Route>>> + '_>;

    /// Number of distinct entries, hydrated or not.
    fn count(&self) -> usize;

    /// Collect every route, failing on the first bad entry.
    fn all(&self) -> RoutingResult<Vec<Arc<Route>>> {
        self.iter().collect()
    }
}

/// Mutable collection used while routes are being registered.
#[derive(Debug, Default)]
pub struct RouteCollection {
    routes: Vec<Arc<Route>>,
    index: HashMap<String, usize>,
    frozen: bool,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Unnamed routes get a name derived from methods and pattern.
    pub fn add(&mut self, mut route: Route) -> Result<Arc<Route>, DefinitionError> {
        if route.name().is_none() {
            let generated = route.generated_name();
            route.assign_name(generated)?;
        }
        let name = route.name().unwrap_or_default().to_string();

        if self.frozen {
            return Err(DefinitionError::CollectionFrozen(name));
        }
        if self.index.contains_key(&name) {
            return Err(DefinitionError::DuplicateName(name));
        }

        tracing::debug!(
            route = %name,
            pattern = %route.pattern().as_str(),
            methods = ?route.methods(),
            "Route registered"
        );

        let route = Arc::new(route);
        self.index.insert(name, self.routes.len());
        self.routes.push(route.clone());
        Ok(route)
    }

    /// Stop accepting routes.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl RouteSource for RouteCollection {
    fn get_by_name(&self, name: &str) -> RoutingResult<Arc<Route>> {
        self.index
            .get(name)
            .map(|&i| self.routes[i].clone())
            .ok_or_else(|| RoutingError::RouteNotFound(name.to_string()))
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RoutingResult<Arc<Route>>> + '_> {
        Box::new(self.routes.iter().cloned().map(Ok))
    }

    fn count(&self) -> usize {
        self.routes.len()
    }
}

#[derive(Debug)]
struct CachedEntry {
    key: String,
    serialized: String,
    hydrated: OnceLock<Arc<Route>>,
}

/// Frozen collection backed by serialized routes from the cache artifact.
#[derive(Debug, Default)]
pub struct CachedRouteCollection {
    entries: Vec<CachedEntry>,
    index: HashMap<String, usize>,
}

impl CachedRouteCollection {
    /// Build from `name -> serialized route` pairs. A repeated key replaces
    /// the earlier value but keeps its position.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut collection = Self::default();
        for (key, serialized) in entries {
            let entry = CachedEntry {
                key: key.clone(),
                serialized,
                hydrated: OnceLock::new(),
            };
            match collection.index.get(&key) {
                Some(&i) => collection.entries[i] = entry,
                None => {
                    collection.index.insert(key, collection.entries.len());
                    collection.entries.push(entry);
                }
            }
        }
        collection
    }

    /// Number of entries already deserialized.
    pub fn hydrated_count(&self) -> usize {
        self.entries.iter().filter(|e| e.hydrated.get().is_some()).count()
    }

    fn hydrate(&self, entry: &CachedEntry) -> RoutingResult<Arc<Route>> {
        if let Some(route) = entry.hydrated.get() {
            return Ok(route.clone());
        }

        let route: Route = serde_json::from_str(&entry.serialized).map_err(|e| {
            CacheCorrupted::InvalidEntry {
                key: entry.key.clone(),
                reason: e.to_string(),
            }
        })?;
        route.validate().map_err(|e| CacheCorrupted::InvalidEntry {
            key: entry.key.clone(),
            reason: e.to_string(),
        })?;

        let stored = route.name().unwrap_or_default();
        if stored != entry.key {
            tracing::error!(
                expected = %entry.key,
                stored = %stored,
                "Route cache entry does not match its key"
            );
            return Err(CacheCorrupted::NameMismatch {
                expected: entry.key.clone(),
                stored: stored.to_string(),
            }
            .into());
        }

        Ok(entry.hydrated.get_or_init(|| Arc::new(route)).clone())
    }
}

impl RouteSource for CachedRouteCollection {
    fn get_by_name(&self, name: &str) -> RoutingResult<Arc<Route>> {
        let i = self
            .index
            .get(name)
            .ok_or_else(|| RoutingError::RouteNotFound(name.to_string()))?;
        self.hydrate(&self.entries[*i])
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RoutingResult<Arc<Route>>> + '_> {
        let mut failed = false;
        Box::new(self.entries.iter().map_while(move |entry| {
            if failed {
                return None;
            }
            let result = self.hydrate(entry);
            failed = result.is_err();
            Some(result)
        }))
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}
