//! Admin area URL rewriting.
//!
//! The host CMS serves its admin screens through a single script with the
//! screen name in a query parameter (`/wp-admin/admin.php?page=settings`),
//! while routes are declared as plain paths (`/wp-admin/admin.php/settings`).
//! An `AdminArea` translates between the two in both directions.

use std::fmt::Debug;

use axum::body::Body;
use axum::http::Request;
use url::form_urlencoded;

/// Rewrite strategy for a host-specific admin URL namespace.
pub trait AdminArea: Send + Sync + Debug {
    /// Path prefix owned by the area, without a trailing slash.
    fn url_prefix(&self) -> &str;

    /// Turn a generated route path into the path + query the host expects.
    fn rewrite_for_url_generation(&self, path: &str) -> (String, Vec<(String, String)>);

    /// Turn an incoming admin request into the path routes are declared with.
    fn rewrite_for_routing(&self, request: &Request<Body>) -> String;

    /// Whether a path belongs to this area.
    fn contains(&self, path: &str) -> bool {
        let prefix = self.url_prefix();
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// WordPress-style admin area: `{prefix}/{script}/{page}` <-> `{prefix}/{script}?page={page}`.
#[derive(Debug, Clone)]
pub struct WpAdminArea {
    prefix: String,
    script: String,
}

impl WpAdminArea {
    pub fn new(prefix: impl Into<String>, script: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            script: script.into().trim_matches('/').to_string(),
        }
    }

    fn script_path(&self) -> String {
        format!("{}/{}", self.prefix, self.script)
    }
}

impl Default for WpAdminArea {
    fn default() -> Self {
        Self::new("/wp-admin", "admin.php")
    }
}

impl AdminArea for WpAdminArea {
    fn url_prefix(&self) -> &str {
        &self.prefix
    }

    fn rewrite_for_url_generation(&self, path: &str) -> (String, Vec<(String, String)>) {
        let script_path = self.script_path();
        match path.strip_prefix(&script_path).and_then(|rest| rest.strip_prefix('/')) {
            Some(page) if !page.is_empty() && !page.contains('/') => {
                (script_path, vec![("page".to_string(), page.to_string())])
            }
            _ => (path.to_string(), Vec::new()),
        }
    }

    fn rewrite_for_routing(&self, request: &Request<Body>) -> String {
        let path = request.uri().path();
        if path != self.script_path() {
            return path.to_string();
        }

        let page = request.uri().query().and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "page")
                .map(|(_, v)| v.into_owned())
        });
        match page {
            Some(page) if !page.is_empty() => format!("{}/{}", path, page),
            _ => path.to_string(),
        }
    }
}
