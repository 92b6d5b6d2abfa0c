//! Discovery view over the registered routes.
//!
//! The view is computed on first use and cached for the lifetime of the
//! server: the route table is frozen once initialization finishes, so the
//! cache is never invalidated. Only descriptive data is exposed; handlers,
//! the `private` flag, and raw schema documents never leave the process.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RequestContext;
use crate::handler::{HandlerError, HandlerResult};
use crate::method::Method;
use crate::route::{Route, RouteDefinition};
use crate::schema::SchemaDescription;

/// Default path of the discovery route.
pub const DEFAULT_META_ROUTE_PATH: &str = "/.well-known/routes";

/// Public description of one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    pub path: String,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema_info: Option<SchemaDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema_info: Option<SchemaDescription>,
}

impl RouteInfo {
    pub fn from_route(route: &Route) -> Self {
        Self {
            path: route.path().to_string(),
            method: route.method(),
            description: route.description().map(str::to_string),
            input_schema_info: route.input_schema_info(),
            output_schema_info: route.output_schema_info(),
        }
    }
}

/// Describe every non-private route, in registration order.
pub fn describe_routes(routes: &[Arc<Route>]) -> Vec<RouteInfo> {
    routes
        .iter()
        .filter(|route| !route.is_private())
        .map(|route| RouteInfo::from_route(route))
        .collect()
}

/// Lazily computed, write-once discovery document.
#[derive(Debug, Default)]
pub struct Introspection {
    routes: OnceCell<Arc<[Arc<Route>]>>,
    cache: OnceCell<Value>,
}

impl Introspection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hand over the frozen route table. Only the first call has any effect;
    /// returns whether this call was it.
    pub fn attach(&self, routes: Arc<[Arc<Route>]>) -> bool {
        self.routes.set(routes).is_ok()
    }

    /// The discovery document, computed on first call.
    ///
    /// Returns `Ok(None)` until a route table has been attached.
    pub fn document(&self) -> serde_json::Result<Option<&Value>> {
        let Some(routes) = self.routes.get() else {
            return Ok(None);
        };

        self.cache
            .get_or_try_init(|| {
                let infos = describe_routes(routes);
                tracing::debug!(routes = infos.len(), "computed route discovery document");
                serde_json::to_value(infos)
            })
            .map(Some)
    }

    /// Route definition serving the discovery document.
    pub fn definition(self: &Arc<Self>, method: Method, path: impl Into<String>) -> RouteDefinition {
        let introspection = Arc::clone(self);
        RouteDefinition::new(path, move |_ctx: RequestContext| {
            let introspection = Arc::clone(&introspection);
            async move { introspection.respond() }
        })
        .method(method)
        .description("Route info.")
    }

    fn respond(&self) -> HandlerResult {
        match self.document()? {
            Some(document) => Ok(Some(document.clone())),
            None => Err(HandlerError::msg("route table is not initialized")),
        }
    }
}
