//! Server shell: configuration, registrar bootstrap, and listening.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use switchyard_lib::{Introspection, Pipeline, RegistrationError, Route};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::config::ServerConfig;
use crate::health::{health_live, health_ready};
use crate::metrics::metrics_handler;
use crate::middleware::MetricsLayer;
use crate::registry::{build_router, RouteRegistry};
use crate::AppState;

/// Startup function that registers routes.
pub type Registrar =
    Box<dyn FnOnce(&mut RouteRegistry) -> Result<(), RegistrationError> + Send + 'static>;

/// Box a closure as a [`Registrar`].
pub fn registrar<F>(f: F) -> Registrar
where
    F: FnOnce(&mut RouteRegistry) -> Result<(), RegistrationError> + Send + 'static,
{
    Box::new(f)
}

/// Paths served outside the route prefix.
const HEALTH_PATHS: [&str; 2] = ["/health/live", "/health/ready"];

/// Fatal startup and serving errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("route {0} collides with a built-in endpoint")]
    ReservedPath(String),

    #[error("server is already initialized")]
    AlreadyInitialized,

    #[error("server is not initialized; call Server::init first")]
    NotInitialized,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct Initialized {
    routes: Arc<[Arc<Route>]>,
    router: Router,
}

/// An HTTP server built from registrars.
///
/// ```no_run
/// use serde_json::json;
/// use switchyard_lib::{HandlerResult, RequestContext, RouteDefinition};
/// use switchyard_server::{registrar, Server, ServerConfig};
///
/// # async fn run() -> Result<(), switchyard_server::ServerError> {
/// let server = Server::new(
///     ServerConfig::default(),
///     vec![registrar(|routes| {
///         routes.register(RouteDefinition::new("/ping", |_ctx: RequestContext| async {
///             HandlerResult::Ok(Some(json!("pong")))
///         }))
///     })],
/// )?;
/// server.serve().await
/// # }
/// ```
pub struct Server {
    config: ServerConfig,
    pending: Vec<Registrar>,
    state: Option<Initialized>,
    span: Span,
}

impl Server {
    /// Create a server, running [`Self::init`] unless `config.init` is false.
    pub fn new(config: ServerConfig, registrars: Vec<Registrar>) -> Result<Self, ServerError> {
        let span = info_span!("server", service = %config.service_name, port = config.port);
        let init = config.init;
        let mut server = Self {
            config,
            pending: registrars,
            state: None,
            span,
        };

        if init {
            server.init()?;
        }
        Ok(server)
    }

    /// Run the registrars, register the discovery route, and build the router.
    ///
    /// Fails when called twice or when any registration is rejected.
    pub fn init(&mut self) -> Result<(), ServerError> {
        let _enter = self.span.enter();
        if self.state.is_some() {
            return Err(ServerError::AlreadyInitialized);
        }

        let prefix = normalize_prefix(self.config.prefix.as_deref())?;
        if let Some(path) = self.config.metrics_path.as_deref() {
            if !path.starts_with('/') || path.contains(['{', '}']) {
                return Err(ServerError::InvalidConfig {
                    field: "metrics_path",
                    reason: format!("'{path}' must be a static path starting with '/'"),
                });
            }
        }

        info!("initializing registrars");
        let mut registry = RouteRegistry::new();
        for registrar in self.pending.drain(..) {
            registrar(&mut registry)?;
        }
        let registered = registry.len();

        let introspection = Introspection::new();
        if self.config.meta_route {
            registry.register(introspection.definition(
                self.config.meta_route_method,
                self.config.meta_route_path.clone(),
            ))?;
        }

        let routes = registry.freeze();
        introspection.attach(Arc::clone(&routes));
        self.check_reserved(&routes, prefix.as_deref())?;

        let state = AppState::new(
            self.config.service_name.clone(),
            Arc::clone(&routes),
            registered,
            Pipeline::new(self.config.pipeline_options()).with_routes(Arc::clone(&routes)),
            self.config.body_limit,
        );

        let mut router = build_router(&routes);
        if let Some(prefix) = prefix.as_deref() {
            router = Router::new().nest(prefix, router);
        }
        if self.config.health_routes {
            router = router
                .route(HEALTH_PATHS[0], get(health_live))
                .route(HEALTH_PATHS[1], get(health_ready));
        }
        if let Some(path) = self.config.metrics_path.as_deref() {
            router = router.route(path, get(metrics_handler));
        }

        let router = router
            .layer(TraceLayer::new_for_http())
            .layer(MetricsLayer)
            .with_state(state);

        info!(
            routes = routes.len(),
            prefix = prefix.as_deref().unwrap_or("/"),
            "server initialized"
        );
        self.state = Some(Initialized { routes, router });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered routes; empty until initialized.
    pub fn routes(&self) -> &[Arc<Route>] {
        match &self.state {
            Some(state) => &state.routes,
            None => &[],
        }
    }

    /// The fully layered axum router.
    pub fn router(&self) -> Result<Router, ServerError> {
        self.state
            .as_ref()
            .map(|state| state.router.clone())
            .ok_or(ServerError::NotInitialized)
    }

    /// Bind `0.0.0.0:port` and serve until Ctrl-C.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router()?;
        let span = self.span.clone();

        async move {
            info!(addr = %listener.local_addr()?, "listening");
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown)
            .await?;
            info!("server stopped");
            Ok::<(), ServerError>(())
        }
        .instrument(span)
        .await
    }

    fn check_reserved(
        &self,
        routes: &[Arc<Route>],
        prefix: Option<&str>,
    ) -> Result<(), ServerError> {
        let mut reserved: Vec<&str> = Vec::new();
        if self.config.health_routes {
            reserved.extend(HEALTH_PATHS);
        }
        if let Some(path) = self.config.metrics_path.as_deref() {
            reserved.push(path);
        }

        for route in routes {
            let full = full_path(prefix, route.path());
            if reserved.contains(&full.as_str()) {
                return Err(ServerError::ReservedPath(full));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("pending_registrars", &self.pending.len())
            .field("routes", &self.routes().len())
            .finish()
    }
}

/// `None` for an absent or root prefix; otherwise `/segment` without a
/// trailing slash.
fn normalize_prefix(prefix: Option<&str>) -> Result<Option<String>, ServerError> {
    let Some(prefix) = prefix.map(str::trim) else {
        return Ok(None);
    };
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !trimmed.starts_with('/') {
        return Err(ServerError::InvalidConfig {
            field: "prefix",
            reason: format!("'{prefix}' must start with '/'"),
        });
    }
    if trimmed.contains(['{', '}']) {
        return Err(ServerError::InvalidConfig {
            field: "prefix",
            reason: format!("'{prefix}' must not contain captures"),
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// Path a route is served at once the prefix is applied.
fn full_path(prefix: Option<&str>, path: &str) -> String {
    match prefix {
        None => path.to_string(),
        Some(prefix) if path == "/" => prefix.to_string(),
        Some(prefix) => format!("{prefix}{path}"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal, exiting gracefully");
}
