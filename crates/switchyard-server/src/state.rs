//! Shared state handed to every axum handler.

use std::sync::Arc;

use switchyard_lib::{Pipeline, Route};

/// Frozen route table plus the pipeline that serves it.
///
/// Cheap to clone; share it through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: String,
    routes: Arc<[Arc<Route>]>,
    registered: usize,
    pipeline: Pipeline,
    body_limit: usize,
}

impl AppState {
    /// `registered` counts the routes added by registrars, which excludes
    /// the discovery route.
    pub fn new(
        service: impl Into<String>,
        routes: Arc<[Arc<Route>]>,
        registered: usize,
        pipeline: Pipeline,
        body_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                service: service.into(),
                routes,
                registered,
                pipeline,
                body_limit,
            }),
        }
    }

    /// Service name reported by the health probes.
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.inner.routes
    }

    /// Routes added by registrars.
    pub fn registered_count(&self) -> usize {
        self.inner.registered
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Maximum accepted request body size, in bytes.
    pub fn body_limit(&self) -> usize {
        self.inner.body_limit
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.inner.service)
            .field("route_count", &self.inner.routes.len())
            .field("registered", &self.inner.registered)
            .field("pipeline", &self.inner.pipeline)
            .field("body_limit", &self.inner.body_limit)
            .finish()
    }
}
