//! Startup orchestration.
//!
//! # Responsibilities
//! - Pick the route source: compiled cache or freshly registered routes
//! - Initialize signing, matching, pipelines and URL generation in order
//! - Start background tasks (signed URL garbage collection)
//!
//! # Design Decisions
//! - Two phases: routes are registered and frozen, then everything that
//!   reads them is built; nothing reads a collection that can still change
//! - Fail fast: any startup error is fatal

use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::{RouterConfig, SigningConfig, StorageKind};
use crate::http::kernel::HttpKernel;
use crate::http::middleware::{RoutingMiddleware, SignedUrlMiddleware, SIGNED_MIDDLEWARE};
use crate::http::response::{DefaultResponseNormalizer, ResponseNormalizer};
use crate::lifecycle::shutdown::BackgroundTasks;
use crate::pipeline::errors::{DefaultErrorTranslator, ErrorTranslator};
use crate::pipeline::middleware::{MiddlewareRegistry, PipelineServices};
use crate::pipeline::runner::{ControllerResolver, RouteRunner};
use crate::routing::area::{AdminArea, WpAdminArea};
use crate::routing::cache::load_cache;
use crate::routing::collection::{RouteCollection, RouteSource};
use crate::routing::error::{DefinitionError, RoutingError};
use crate::routing::generator::UrlGenerator;
use crate::routing::matcher::UrlMatcher;
use crate::signing::error::SigningError;
use crate::signing::gc::spawn_garbage_collector;
use crate::signing::signer::{SigningSecret, UrlSigner};
use crate::signing::storage::{FileStorage, InMemoryStorage, SignedUrlStorage};

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Host-provided pieces the router does not own.
pub struct Collaborators {
    pub middleware: MiddlewareRegistry,
    pub controllers: Arc<dyn ControllerResolver>,
    pub translator: Arc<dyn ErrorTranslator>,
    pub normalizer: Arc<dyn ResponseNormalizer>,
    /// Overrides the storage selected in config.
    pub storage: Option<Arc<dyn SignedUrlStorage>>,
}

impl Collaborators {
    pub fn new(middleware: MiddlewareRegistry, controllers: Arc<dyn ControllerResolver>) -> Self {
        Self {
            middleware,
            controllers,
            translator: Arc::new(DefaultErrorTranslator::new()),
            normalizer: Arc::new(DefaultResponseNormalizer),
            storage: None,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn ErrorTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn ResponseNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn SignedUrlStorage>) -> Self {
        self.storage = Some(storage);
        self
    }
}

/// Phase one: the routes the application will serve.
///
/// A configured cache file that exists wins over `registered`.
pub fn route_source(
    config: &RouterConfig,
    mut registered: RouteCollection,
) -> Result<Arc<dyn RouteSource>, BootError> {
    if let Some(path) = config.cache.path.as_deref().filter(|p| p.exists()) {
        let cached = load_cache(path)?;
        tracing::info!(path = %path.display(), routes = cached.count(), "Loaded compiled route cache");
        return Ok(Arc::new(cached));
    }

    registered.freeze();
    tracing::info!(routes = registered.count(), "Using registered routes");
    Ok(Arc::new(registered))
}

fn build_storage(config: &SigningConfig) -> Arc<dyn SignedUrlStorage> {
    match (config.storage, &config.storage_path) {
        (StorageKind::File, Some(path)) => Arc::new(FileStorage::new(path)),
        (StorageKind::File, None) => {
            tracing::warn!("File storage selected without a path, using memory");
            Arc::new(InMemoryStorage::new())
        }
        (StorageKind::Memory, _) => Arc::new(InMemoryStorage::new()),
    }
}

/// A booted router.
pub struct Application {
    kernel: HttpKernel,
    urls: UrlGenerator,
    signer: Arc<UrlSigner>,
    routes: Arc<dyn RouteSource>,
    config: RouterConfig,
}

impl Application {
    /// Phase two: build every subsystem that reads the frozen routes.
    pub fn boot(
        config: &RouterConfig,
        routes: Arc<dyn RouteSource>,
        collaborators: Collaborators,
    ) -> Result<Self, BootError> {
        let Collaborators {
            mut middleware,
            controllers,
            translator,
            normalizer,
            storage,
        } = collaborators;

        let secret = SigningSecret::from_hex(&config.signing.secret)?;
        let storage = storage.unwrap_or_else(|| build_storage(&config.signing));
        let signer = Arc::new(
            UrlSigner::new(secret, storage).with_defaults(config.signing.lifetime(), config.signing.max_usage),
        );

        let admin_area: Option<Arc<dyn AdminArea>> = config.admin_area.enabled.then(|| {
            Arc::new(WpAdminArea::new(&config.admin_area.prefix, &config.admin_area.script)) as Arc<dyn AdminArea>
        });

        let matcher = Arc::new(UrlMatcher::new(&*routes)?);

        if !middleware.contains(SIGNED_MIDDLEWARE) {
            SignedUrlMiddleware::register(&mut middleware, signer.clone());
        }
        let services = PipelineServices::new(Arc::new(middleware), translator);

        let runner = RouteRunner::new(services.clone(), config.middleware.resolver()?, controllers, normalizer)
            .with_global(config.middleware.global_blueprints()?)
            .with_routeless(config.middleware.routeless_blueprints()?);

        let mut routing = RoutingMiddleware::new(matcher);
        let mut urls = UrlGenerator::new(routes.clone(), config.url.context()).with_signer(signer.clone());
        if let Some(area) = &admin_area {
            routing = routing.with_admin_area(area.clone());
            urls = urls.with_admin_area(area.clone());
        }

        let kernel = HttpKernel::new(services, routing, runner);

        tracing::info!(
            routes = routes.count(),
            admin_area = admin_area.is_some(),
            "Router booted"
        );

        Ok(Self {
            kernel,
            urls,
            signer,
            routes,
            config: config.clone(),
        })
    }

    pub fn kernel(&self) -> &HttpKernel {
        &self.kernel
    }

    pub fn urls(&self) -> &UrlGenerator {
        &self.urls
    }

    pub fn signer(&self) -> &Arc<UrlSigner> {
        &self.signer
    }

    pub fn routes(&self) -> &Arc<dyn RouteSource> {
        &self.routes
    }

    /// Start signed URL garbage collection. Requires a tokio runtime.
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let handle = spawn_garbage_collector(
            self.signer.clone(),
            self.config.signing.gc_interval(),
            tasks.subscribe(),
        );
        tasks.track(handle);
        tasks
    }
}
