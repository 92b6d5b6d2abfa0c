//! Per-request state handed to route handlers.

use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::route::Route;

/// What the transport hands to the pipeline for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    /// Correlation id for logs and error bodies.
    pub request_id: String,
    /// Request method as received.
    pub method: http::Method,
    /// Request path as received (prefix included).
    pub path: String,
    /// Decoded query parameters.
    pub query: Map<String, Value>,
    /// Parsed JSON body, if the request carried one.
    pub body: Option<Value>,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestInput {
    /// Start building an input for `method` and `path`.
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set the parsed body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the correlation id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Merge body and query parameters into one input map.
///
/// Body fields are copied first and query fields second, so a query parameter
/// overrides a body field with the same name. Bodies that are not JSON objects
/// contribute nothing to the merge.
pub fn merge_input(body: Option<&Value>, query: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = match body {
        Some(Value::Object(fields)) => fields.clone(),
        _ => Map::new(),
    };
    for (key, value) in query {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[derive(Debug, Default)]
struct ResponseSlot {
    status: Option<StatusCode>,
    body: Option<Value>,
}

/// Shared handle to the response being built for one request.
///
/// Handlers that do not return a value use this to set the body (and
/// optionally the status) directly.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    slot: Arc<Mutex<ResponseSlot>>,
}

impl ResponseHandle {
    /// Set the response status.
    pub fn set_status(&self, status: StatusCode) {
        self.slot.lock().status = Some(status);
    }

    /// Set the response body.
    pub fn set_body(&self, body: impl Into<Value>) {
        self.slot.lock().body = Some(body.into());
    }

    /// Status set so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.slot.lock().status
    }

    /// Body set so far, if any.
    pub fn body(&self) -> Option<Value> {
        self.slot.lock().body.clone()
    }

    pub(crate) fn take(&self) -> (Option<StatusCode>, Option<Value>) {
        let mut slot = self.slot.lock();
        (slot.status.take(), slot.body.take())
    }
}

/// Request context passed to a route handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: http::Method,
    path: String,
    headers: HeaderMap,
    query: Map<String, Value>,
    body: Option<Value>,
    raw_input: Map<String, Value>,
    input: Value,
    response: ResponseHandle,
    routes: Arc<[Arc<Route>]>,
}

impl RequestContext {
    pub(crate) fn from_input(input: RequestInput) -> Self {
        let raw_input = merge_input(input.body.as_ref(), &input.query);
        Self {
            request_id: input.request_id,
            method: input.method,
            path: input.path,
            headers: input.headers,
            query: input.query,
            body: input.body,
            input: Value::Object(raw_input.clone()),
            raw_input,
            response: ResponseHandle::default(),
            routes: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn set_input(&mut self, input: Value) {
        self.input = input;
    }

    pub(crate) fn set_routes(&mut self, routes: Arc<[Arc<Route>]>) {
        self.routes = routes;
    }

    /// Correlation id of this request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Request method.
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Decoded query parameters.
    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    /// Parsed body, exactly as received.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Merged body and query, before any validation.
    pub fn raw_input(&self) -> &Map<String, Value> {
        &self.raw_input
    }

    /// Input for the handler: the validated and coerced value when the route
    /// has an input schema, otherwise the raw merged input.
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Deserialize [`Self::input`] into a typed value.
    pub fn input_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.input.clone())
    }

    /// Handle for setting the response status or body directly.
    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    /// The server's frozen route table, private routes included.
    ///
    /// Empty when the pipeline was built without one.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_overrides_body_on_collision() {
        let body = json!({ "a": 1, "b": 1 });
        let mut query = Map::new();
        query.insert("a".to_string(), json!("2"));

        let merged = merge_input(Some(&body), &query);
        assert_eq!(merged["a"], json!("2"));
        assert_eq!(merged["b"], json!(1));
    }

    #[test]
    fn non_object_body_is_not_merged() {
        let body = json!([1, 2, 3]);
        let merged = merge_input(Some(&body), &Map::new());
        assert!(merged.is_empty());
    }

    #[test]
    fn context_exposes_raw_and_merged_input() {
        let input = RequestInput::new(http::Method::POST, "/items")
            .with_body(json!({ "name": "x" }))
            .with_query("dry_run", "true");
        let ctx = RequestContext::from_input(input);

        assert_eq!(ctx.body(), Some(&json!({ "name": "x" })));
        assert_eq!(ctx.input(), &json!({ "name": "x", "dry_run": "true" }));
        assert_eq!(ctx.raw_input().len(), 2);
    }

    #[test]
    fn response_handle_is_shared_between_clones() {
        let handle = ResponseHandle::default();
        let clone = handle.clone();
        clone.set_status(StatusCode::CREATED);
        clone.set_body("done");

        assert_eq!(handle.status(), Some(StatusCode::CREATED));
        assert_eq!(handle.body(), Some(json!("done")));
        assert_eq!(handle.take(), (Some(StatusCode::CREATED), Some(json!("done"))));
        assert_eq!(handle.body(), None);
    }

    #[test]
    fn route_table_is_empty_until_attached() {
        let mut ctx = RequestContext::from_input(RequestInput::default());
        assert!(ctx.routes().is_empty());

        let definition = crate::route::RouteDefinition::new("/a", |_ctx: RequestContext| async {
            crate::handler::HandlerResult::Ok(None)
        });
        let routes: Vec<Arc<Route>> = vec![Arc::new(Route::resolve(definition).unwrap())];
        ctx.set_routes(Arc::from(routes));
        assert_eq!(ctx.routes()[0].path(), "/a");
    }

    #[test]
    fn input_as_deserializes_typed_values() {
        #[derive(serde::Deserialize)]
        struct Item {
            name: String,
        }

        let ctx = RequestContext::from_input(
            RequestInput::new(http::Method::GET, "/").with_query("name", "bolt"),
        );
        let item: Item = ctx.input_as().unwrap();
        assert_eq!(item.name, "bolt");
    }
}
