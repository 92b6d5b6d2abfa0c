//! Route registry and axum wiring.
//!
//! Registrars add routes during startup through [`RouteRegistry::register`].
//! Once initialization finishes the registry is frozen into a shared slice
//! and every route is wired into an axum [`MethodRouter`] on its path.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::handler::Handler as AxumHandler;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodFilter, MethodRouter};
use axum::Router;
use http::{header, HeaderValue, StatusCode};
use switchyard_lib::{Method, RegistrationError, Route, RouteDefinition};
use tracing::{debug, info};

use crate::metrics::record_pipeline_outcome;
use crate::request::{read_input, request_id};
use crate::response::ServiceResponse;
use crate::AppState;

/// Ordered, append-only list of registered routes.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<Arc<Route>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `definition` and append it.
    ///
    /// Rejects paths axum cannot route, paths the router would find ambiguous
    /// next to an existing path, and any `(method, path)` pair that overlaps
    /// an existing registration, counting `ALL` as every method.
    pub fn register(&mut self, definition: RouteDefinition) -> Result<(), RegistrationError> {
        let route = Route::resolve(definition)?;
        let segments = parse_path(route.path())?;

        for existing in &self.routes {
            if existing.path() == route.path() {
                if existing.method().overlaps(route.method()) {
                    return Err(RegistrationError::DuplicateRoute {
                        method: route.method(),
                        path: route.path().to_string(),
                        existing: existing.method(),
                    });
                }
                continue;
            }
            if conflicts(&segments, &parse_path(existing.path())?) {
                return Err(RegistrationError::PathConflict {
                    path: route.path().to_string(),
                    existing: existing.path().to_string(),
                });
            }
        }

        info!(
            method = %route.method(),
            path = %route.path(),
            private = route.is_private(),
            "route registered"
        );
        self.routes.push(Arc::new(route));
        Ok(())
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Stop accepting routes and share the table.
    pub fn freeze(self) -> Arc<[Arc<Route>]> {
        Arc::from(self.routes)
    }
}

/// One `/`-separated piece of a route path, as the router sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

/// Split `path` into segments, rejecting anything axum would refuse at
/// router construction.
///
/// A capture must fill its whole segment, and a catch-all may only be the
/// last segment. `{{` and `}}` are literal braces.
pub(crate) fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, RegistrationError> {
    let invalid = |reason: &str| RegistrationError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let raw: Vec<&str> = path.split('/').skip(1).collect();
    let mut segments = Vec::with_capacity(raw.len());

    for (index, segment) in raw.iter().copied().enumerate() {
        if segment.starts_with(':') {
            return Err(invalid("captures use '{name}', not ':name'"));
        }
        if segment.starts_with('*') {
            return Err(invalid("wildcards use '{*name}', not '*name'"));
        }

        let unescaped = segment.replace("{{", "").replace("}}", "");
        if !unescaped.contains(['{', '}']) {
            segments.push(Segment::Static(segment));
            continue;
        }

        let Some(inner) = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .filter(|inner| !inner.contains(['{', '}']))
        else {
            return Err(invalid("a capture must span the whole segment"));
        };

        let (name, catch_all) = match inner.strip_prefix('*') {
            Some(name) => (name, true),
            None => (inner, false),
        };
        if name.is_empty() {
            return Err(invalid("captures must be named"));
        }
        if !catch_all {
            segments.push(Segment::Param(name));
        } else if index + 1 == raw.len() {
            segments.push(Segment::CatchAll(name));
        } else {
            return Err(invalid("a catch-all must be the last segment"));
        }
    }
    Ok(segments)
}

/// Whether the router would reject two distinct paths as ambiguous.
///
/// Static segments take priority over captures, so paths stop competing at
/// the first segment where they differ statically or one is static. Two
/// captures in the same position must agree on name and kind.
pub(crate) fn conflicts(a: &[Segment<'_>], b: &[Segment<'_>]) -> bool {
    for (left, right) in a.iter().zip(b) {
        match (left, right) {
            (Segment::Static(x), Segment::Static(y)) if x == y => continue,
            (Segment::Param(x), Segment::Param(y)) if x == y => continue,
            (Segment::CatchAll(x), Segment::CatchAll(y)) if x == y => continue,
            (Segment::Static(_), _) | (_, Segment::Static(_)) => return false,
            _ => return true,
        }
    }
    false
}

/// Build the dispatch table for a frozen route list.
///
/// Routes sharing a path share one [`MethodRouter`]; registration already
/// guarantees their methods do not overlap. Paths without an `OPTIONS` or
/// `ALL` route answer `OPTIONS` with `200` and an `Allow` header.
pub fn build_router(routes: &[Arc<Route>]) -> Router<AppState> {
    let mut groups: Vec<(&str, Vec<&Arc<Route>>)> = Vec::new();
    for route in routes {
        match groups.iter_mut().find(|(path, _)| *path == route.path()) {
            Some((_, members)) => members.push(route),
            None => groups.push((route.path(), vec![route])),
        }
    }

    groups
        .into_iter()
        .fold(Router::new(), |router, (path, members)| {
            let mut method_router = MethodRouter::new();
            for route in &members {
                let target = Arc::clone(route);
                let endpoint = move |State(state): State<AppState>, request: Request| {
                    dispatch(state, Arc::clone(&target), request)
                };
                method_router = wire(method_router, route.method(), endpoint);
                debug!(method = %route.method(), path, "route wired");
            }

            if let Some(allow) = allow_header(&members) {
                method_router = method_router.options(move || {
                    let allow = allow.clone();
                    async move { (StatusCode::OK, [(header::ALLOW, allow)]) }
                });
            }
            router.route(path, method_router)
        })
}

/// `Allow` value for the implicit `OPTIONS` answer, or `None` when a route
/// already handles `OPTIONS` on this path.
fn allow_header(members: &[&Arc<Route>]) -> Option<HeaderValue> {
    let mut allowed: Vec<&str> = vec!["OPTIONS"];
    for route in members {
        match route.method() {
            Method::All | Method::Options => return None,
            Method::Get => allowed.extend(["GET", "HEAD"]),
            other => allowed.push(other.as_str()),
        }
    }
    allowed.sort_unstable();
    allowed.dedup();
    HeaderValue::from_str(&allowed.join(", ")).ok()
}

fn wire<H, T>(
    router: MethodRouter<AppState>,
    method: Method,
    endpoint: H,
) -> MethodRouter<AppState>
where
    H: AxumHandler<T, AppState>,
    T: 'static,
{
    match method {
        // An ALL route never shares its path with another method.
        Method::All => any(endpoint),
        Method::Delete => router.on(MethodFilter::DELETE, endpoint),
        Method::Get => router.on(MethodFilter::GET, endpoint),
        Method::Head => router.on(MethodFilter::HEAD, endpoint),
        Method::Options => router.on(MethodFilter::OPTIONS, endpoint),
        Method::Patch => router.on(MethodFilter::PATCH, endpoint),
        Method::Post => router.on(MethodFilter::POST, endpoint),
        Method::Put => router.on(MethodFilter::PUT, endpoint),
    }
}

/// Run one request for `route`.
async fn dispatch(state: AppState, route: Arc<Route>, request: Request) -> Response {
    let pipeline = state.pipeline();
    let request_id = request_id(&request);

    let response = match read_input(request, request_id.clone(), state.body_limit()).await {
        Ok(input) => pipeline.run(&route, input).await,
        Err(failure) => pipeline.reject(&route, request_id.as_str(), &failure),
    };

    record_pipeline_outcome(&response, route.path());
    ServiceResponse(response).into_response()
}
