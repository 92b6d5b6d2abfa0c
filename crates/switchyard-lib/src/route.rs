//! Route definitions and their resolved, registered form.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::RegistrationError;
use crate::handler::{Handler, HandlerResult};
use crate::method::Method;
use crate::schema::{compile, CompiledSchema, SchemaDescription};

/// Which side of a route a schema constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaRole {
    Input,
    Output,
}

impl fmt::Display for SchemaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRole::Input => f.write_str("input"),
            SchemaRole::Output => f.write_str("output"),
        }
    }
}

/// Caller-supplied route fields. Unset fields take their defaults when the
/// definition is resolved into a [`Route`]:
///
/// | field         | default |
/// |---------------|---------|
/// | `method`      | `GET`   |
/// | `private`     | `false` |
/// | `description` | none    |
/// | schemas       | none    |
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use switchyard_lib::{HandlerResult, Method, RouteDefinition};
///
/// let definition = RouteDefinition::new("/items", |ctx: switchyard_lib::RequestContext| async move {
///     HandlerResult::Ok(Some(ctx.input().clone()))
/// })
/// .method(Method::Post)
/// .description("Create an item.")
/// .input_schema(json!({ "type": "object", "required": ["name"] }));
/// ```
pub struct RouteDefinition {
    pub path: String,
    pub method: Option<Method>,
    pub private: Option<bool>,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub handler: Arc<dyn Handler>,
}

impl RouteDefinition {
    /// Define a route for `path` served by `handler`.
    pub fn new<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::with_handler(path, Arc::new(handler))
    }

    /// Define a route around an already shared handler.
    pub fn with_handler(path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            path: path.into(),
            method: None,
            private: None,
            description: None,
            input_schema: None,
            output_schema: None,
            handler,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = Some(private);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Single-schema form: constrains the request input only.
    pub fn schema(self, schema: Value) -> Self {
        self.input_schema(schema)
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("private", &self.private)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema.is_some())
            .field("output_schema", &self.output_schema.is_some())
            .finish_non_exhaustive()
    }
}

/// A registered route with every default resolved and schemas compiled.
pub struct Route {
    path: String,
    method: Method,
    private: bool,
    description: Option<String>,
    input_schema: Option<CompiledSchema>,
    output_schema: Option<CompiledSchema>,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Apply defaults field by field and compile the schemas.
    ///
    /// Fails when the path is not absolute or a schema does not compile.
    pub fn resolve(definition: RouteDefinition) -> Result<Self, RegistrationError> {
        let method = definition.method.unwrap_or_default();
        let private = definition.private.unwrap_or(false);
        let path = definition.path;

        if !path.starts_with('/') {
            return Err(RegistrationError::InvalidPath {
                path,
                reason: "paths must start with '/'".to_string(),
            });
        }

        let compile_role = |schema: Option<Value>, role: SchemaRole| {
            schema
                .map(|schema| compile(&schema))
                .transpose()
                .map_err(|source| RegistrationError::InvalidSchema {
                    method,
                    path: path.clone(),
                    role,
                    source,
                })
        };
        let input_schema = compile_role(definition.input_schema, SchemaRole::Input)?;
        let output_schema = compile_role(definition.output_schema, SchemaRole::Output)?;

        Ok(Self {
            path,
            method,
            private,
            description: definition.description,
            input_schema,
            output_schema,
            handler: definition.handler,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn input_schema(&self) -> Option<&CompiledSchema> {
        self.input_schema.as_ref()
    }

    pub fn output_schema(&self) -> Option<&CompiledSchema> {
        self.output_schema.as_ref()
    }

    /// Description of the input schema, for introspection only.
    pub fn input_schema_info(&self) -> Option<SchemaDescription> {
        self.input_schema.as_ref().map(CompiledSchema::describe)
    }

    /// Description of the output schema, for introspection only.
    pub fn output_schema_info(&self) -> Option<SchemaDescription> {
        self.output_schema.as_ref().map(CompiledSchema::describe)
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("private", &self.private)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> RouteDefinition {
        RouteDefinition::new("/noop", |_ctx: RequestContext| async { HandlerResult::Ok(None) })
    }

    #[test]
    fn resolve_applies_defaults() {
        let route = Route::resolve(noop()).unwrap();
        assert_eq!(route.method(), Method::Get);
        assert!(!route.is_private());
        assert!(route.description().is_none());
        assert!(route.input_schema().is_none());
    }

    #[test]
    fn resolve_keeps_explicit_fields() {
        let route = Route::resolve(
            noop()
                .method(Method::Delete)
                .private(true)
                .description("Remove everything."),
        )
        .unwrap();
        assert_eq!(route.method(), Method::Delete);
        assert!(route.is_private());
        assert_eq!(route.description(), Some("Remove everything."));
    }

    #[test]
    fn legacy_schema_constrains_input() {
        let route = Route::resolve(noop().schema(json!({ "type": "object" }))).unwrap();
        assert!(route.input_schema().is_some());
        assert!(route.output_schema().is_none());
        assert_eq!(
            route.input_schema_info().unwrap().kind,
            Some(json!("object"))
        );
    }

    #[test]
    fn relative_paths_are_rejected() {
        let err = Route::resolve(RouteDefinition::new("noop", |_ctx: RequestContext| async {
            HandlerResult::Ok(None)
        }))
        .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPath { .. }));
    }

    #[test]
    fn malformed_schemas_are_rejected() {
        let err = Route::resolve(noop().output_schema(json!({ "type": "nothing" }))).unwrap_err();
        match err {
            RegistrationError::InvalidSchema { role, .. } => assert_eq!(role, SchemaRole::Output),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
