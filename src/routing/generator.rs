//! Reverse routing: route name + parameters -> URL.
//!
//! # Responsibilities
//! - Substitute parameters into a route's reverse template
//! - Fall back to defaults, fail on missing required segments
//! - Append leftover parameters as a query string
//! - Apply the admin area rewrite for routes living in that area
//! - Produce signed URLs through the `UrlSigner`
//!
//! # Design Decisions
//! - Built after the collection is frozen; the collection never refers back
//!   to the generator
//! - Leftover parameters are emitted in sorted order so output is stable

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use url::form_urlencoded;

use crate::routing::area::AdminArea;
use crate::routing::collection::RouteSource;
use crate::routing::error::{RoutingError, RoutingResult};
use crate::routing::pattern::Token;
use crate::signing::error::SigningError;
use crate::signing::signer::UrlSigner;

/// Characters escaped inside a generated path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Immutable settings for URL generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlGenerationContext {
    pub scheme: String,
    pub host: String,
    pub trailing_slash: bool,
}

impl UrlGenerationContext {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, trailing_slash: bool) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            trailing_slash,
        }
    }

    /// `scheme://host` with no trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host.trim_end_matches('/'))
    }
}

impl Default for UrlGenerationContext {
    fn default() -> Self {
        Self::new("https", "localhost", false)
    }
}

/// Errors from signed URL generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("No URL signer configured")]
    SignerMissing,
}

/// Generates URLs for named routes.
#[derive(Clone)]
pub struct UrlGenerator {
    routes: Arc<dyn RouteSource>,
    context: UrlGenerationContext,
    admin_area: Option<Arc<dyn AdminArea>>,
    signer: Option<Arc<UrlSigner>>,
}

impl UrlGenerator {
    pub fn new(routes: Arc<dyn RouteSource>, context: UrlGenerationContext) -> Self {
        Self {
            routes,
            context,
            admin_area: None,
            signer: None,
        }
    }

    pub fn with_admin_area(mut self, area: Arc<dyn AdminArea>) -> Self {
        self.admin_area = Some(area);
        self
    }

    pub fn with_signer(mut self, signer: Arc<UrlSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn context(&self) -> &UrlGenerationContext {
        &self.context
    }

    /// URL for the named route.
    pub fn to_route<I, K, V>(&self, name: &str, params: I, absolute: bool) -> RoutingResult<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let route = self.routes.get_by_name(name)?;
        let mut remaining: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut path = String::new();
        let mut skipped_optional: Option<&str> = None;

        for token in route.pattern().tokens() {
            match token {
                Token::Literal(lit) => {
                    path.push('/');
                    path.extend(utf8_percent_encode(lit, SEGMENT));
                }
                Token::Segment { name: segment, optional } => {
                    let provided = remaining.remove(segment).filter(|v| !v.is_empty());
                    let explicit = provided.is_some();
                    let value = provided.or_else(|| route.defaults().get(segment).cloned());

                    match value {
                        // defaults after an omitted optional are implied by the shorter path
                        Some(_) if !explicit && skipped_optional.is_some() => {}
                        Some(value) => {
                            if let Some(skipped) = skipped_optional {
                                return Err(RoutingError::MissingRouteParameter {
                                    route: name.to_string(),
                                    parameter: skipped.to_string(),
                                });
                            }
                            if let Some(req) = route.requirements().get(segment) {
                                if !req.is_satisfied_by(&value) {
                                    return Err(RoutingError::InvalidParameter {
                                        route: name.to_string(),
                                        parameter: segment.clone(),
                                        value,
                                    });
                                }
                            }
                            path.push('/');
                            path.extend(utf8_percent_encode(&value, SEGMENT));
                        }
                        None if *optional => {
                            skipped_optional.get_or_insert(segment.as_str());
                        }
                        None => {
                            return Err(RoutingError::MissingRouteParameter {
                                route: name.to_string(),
                                parameter: segment.clone(),
                            })
                        }
                    }
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        let mut query = Vec::new();
        match self.admin_area.as_ref().filter(|area| area.contains(&path)) {
            Some(area) => {
                let (rewritten, area_query) = area.rewrite_for_url_generation(&path);
                path = rewritten;
                query.extend(area_query);
            }
            None if self.context.trailing_slash && path != "/" => path.push('/'),
            None => {}
        }
        query.extend(remaining);

        Ok(self.finish(path, &query, absolute))
    }

    /// URL for an arbitrary path with query parameters.
    pub fn to<I, K, V>(&self, path: &str, params: I, absolute: bool) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let query: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self.finish(path, &query, absolute)
    }

    /// Signed URL for the named route using the signer's default lifetime.
    ///
    /// `single_use` limits the URL to one successful verification; otherwise
    /// the signer's default usage budget applies.
    pub fn signed_route<I, K, V>(
        &self,
        name: &str,
        params: I,
        absolute: bool,
        single_use: bool,
    ) -> Result<String, GenerationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let signer = self.signer.as_ref().ok_or(GenerationError::SignerMissing)?;
        let max_usage = if single_use { 1 } else { signer.default_max_usage() };
        self.signed_route_with(name, params, absolute, signer.default_lifetime(), max_usage)
    }

    /// Signed URL for the named route with explicit lifetime and usage budget.
    pub fn signed_route_with<I, K, V>(
        &self,
        name: &str,
        params: I,
        absolute: bool,
        lifetime: Duration,
        max_usage: u32,
    ) -> Result<String, GenerationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let signer = self.signer.as_ref().ok_or(GenerationError::SignerMissing)?;
        let relative = self.to_route(name, params, false)?;
        let signed = signer.sign(&relative, lifetime, max_usage)?;

        Ok(if absolute {
            format!("{}{}", self.context.base_url(), signed.url())
        } else {
            signed.url()
        })
    }

    fn finish(&self, path: String, query: &[(String, String)], absolute: bool) -> String {
        let mut url = if absolute {
            format!("{}{}", self.context.base_url(), path)
        } else {
            path
        };
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::area::WpAdminArea;
    use crate::routing::collection::RouteCollection;
    use crate::routing::route::{ControllerRef, Requirement, Route};

    const NONE: [(&str, &str); 0] = [];

    fn generator(context: UrlGenerationContext) -> UrlGenerator {
        let c = || ControllerRef::new("C", "a");
        let mut routes = RouteCollection::new();
        routes.add(Route::get("/users/{id}", c()).unwrap().named("users.show").unwrap()).unwrap();
        routes
            .add(
                Route::get("/teams/{team}/{page?}", c())
                    .unwrap()
                    .with_default("page", "1")
                    .unwrap()
                    .named("teams")
                    .unwrap(),
            )
            .unwrap();
        routes
            .add(Route::get("/archive/{year?}/{month?}", c()).unwrap().named("archive").unwrap())
            .unwrap();
        routes
            .add(
                Route::get("/orders/{id}", c())
                    .unwrap()
                    .require("id", Requirement::Numeric)
                    .unwrap()
                    .named("orders.show")
                    .unwrap(),
            )
            .unwrap();
        routes
            .add(
                Route::get("/calendar/{year?}/{month?}", c())
                    .unwrap()
                    .with_default("month", "1")
                    .unwrap()
                    .named("calendar")
                    .unwrap(),
            )
            .unwrap();
        routes.add(Route::get("/café/{id}", c()).unwrap().named("menu").unwrap()).unwrap();
        routes.add(Route::get("/", c()).unwrap().named("home").unwrap()).unwrap();
        routes
            .add(Route::get("/wp-admin/admin.php/settings", c()).unwrap().named("admin.settings").unwrap())
            .unwrap();
        routes.freeze();
        UrlGenerator::new(Arc::new(routes), context)
    }

    #[test]
    fn test_substitutes_params() {
        let g = generator(UrlGenerationContext::default());
        assert_eq!(g.to_route("users.show", [("id", "42")], false).unwrap(), "/users/42");
        assert_eq!(
            g.to_route("users.show", [("id", "a b/c")], false).unwrap(),
            "/users/a%20b%2Fc"
        );
    }

    #[test]
    fn test_absolute_and_trailing_slash() {
        let g = generator(UrlGenerationContext::new("https", "example.com", true));
        assert_eq!(
            g.to_route("users.show", [("id", "42")], true).unwrap(),
            "https://example.com/users/42/"
        );
        assert_eq!(g.to_route("home", NONE, false).unwrap(), "/");
    }

    #[test]
    fn test_defaults_and_optionals() {
        let g = generator(UrlGenerationContext::default());
        assert_eq!(g.to_route("teams", [("team", "red")], false).unwrap(), "/teams/red/1");
        assert_eq!(g.to_route("archive", NONE, false).unwrap(), "/archive");
        assert_eq!(g.to_route("archive", [("year", "2024")], false).unwrap(), "/archive/2024");

        let err = g.to_route("archive", [("month", "05")], false).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::MissingRouteParameter { parameter, .. } if parameter == "year"
        ));
    }

    #[test]
    fn test_default_after_omitted_optional() {
        let g = generator(UrlGenerationContext::default());
        assert_eq!(g.to_route("calendar", NONE, false).unwrap(), "/calendar");
        assert_eq!(g.to_route("calendar", [("year", "2024")], false).unwrap(), "/calendar/2024/1");
        assert_eq!(
            g.to_route("calendar", [("year", "2024"), ("month", "5")], false).unwrap(),
            "/calendar/2024/5"
        );

        let err = g.to_route("calendar", [("month", "5")], false).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::MissingRouteParameter { parameter, .. } if parameter == "year"
        ));
    }

    #[test]
    fn test_non_ascii_literals_are_encoded() {
        let g = generator(UrlGenerationContext::default());
        assert_eq!(g.to_route("menu", [("id", "1")], false).unwrap(), "/caf%C3%A9/1");
    }

    #[test]
    fn test_missing_required_parameter() {
        let g = generator(UrlGenerationContext::default());
        let err = g.to_route("users.show", NONE, false).unwrap_err();
        assert!(matches!(err, RoutingError::MissingRouteParameter { .. }));
    }

    #[test]
    fn test_unknown_route() {
        let g = generator(UrlGenerationContext::default());
        assert!(matches!(
            g.to_route("nope", NONE, false),
            Err(RoutingError::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_requirement_violation() {
        let g = generator(UrlGenerationContext::default());
        assert!(matches!(
            g.to_route("orders.show", [("id", "abc")], false),
            Err(RoutingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_extra_params_become_query() {
        let g = generator(UrlGenerationContext::default());
        assert_eq!(
            g.to_route("users.show", [("id", "1"), ("tab", "posts"), ("q", "a b")], false)
                .unwrap(),
            "/users/1?q=a+b&tab=posts"
        );
    }

    #[test]
    fn test_idempotent_generation() {
        let g = generator(UrlGenerationContext::default());
        let first = g.to_route("home", NONE, true).unwrap();
        let second = g.to_route("home", NONE, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_admin_area_rewrite() {
        let g = generator(UrlGenerationContext::new("https", "example.com", true))
            .with_admin_area(Arc::new(WpAdminArea::default()));
        assert_eq!(
            g.to_route("admin.settings", NONE, false).unwrap(),
            "/wp-admin/admin.php?page=settings"
        );
    }

    #[test]
    fn test_signed_route_without_signer() {
        let g = generator(UrlGenerationContext::default());
        assert!(matches!(
            g.signed_route("home", NONE, false, true),
            Err(GenerationError::SignerMissing)
        ));
    }

    #[test]
    fn test_arbitrary_path() {
        let g = generator(UrlGenerationContext::new("http", "example.com", false));
        assert_eq!(g.to("login", [("redirect", "/x")], true), "http://example.com/login?redirect=%2Fx");
    }
}
