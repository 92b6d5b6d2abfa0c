//! Switchyard library entry points.
//!
//! This crate holds the transport-independent half of Switchyard: route
//! definitions and their defaults, JSON Schema compilation and validation,
//! the per-request pipeline, uniform error bodies, and the route discovery
//! document. The HTTP server in `switchyard-server` only parses requests into
//! a [`RequestInput`] and writes back the [`PipelineResponse`] produced here.
//!
//! ```text
//! RequestInput ─► merge_input ─► validate ─► Handler ─► check output ─► PipelineResponse
//! ```

#![deny(warnings)]

pub mod context;
pub mod error;
pub mod error_body;
pub mod handler;
pub mod introspection;
pub mod method;
pub mod pipeline;
pub mod route;
pub mod schema;

pub use context::{merge_input, RequestContext, RequestInput, ResponseHandle};
pub use error::{Error, RegistrationError, Result, SchemaError};
pub use error_body::{
    ErrorBody, ErrorObject, PipelineError, BODY_PARSE_ERROR, HANDLER_ERROR,
    INPUT_VALIDATION_ERROR, OUTPUT_VALIDATION_ERROR, QUERY_PARSE_ERROR,
};
pub use handler::{Handler, HandlerError, HandlerResult};
pub use introspection::{describe_routes, Introspection, RouteInfo, DEFAULT_META_ROUTE_PATH};
pub use method::{Method, ParseMethodError};
pub use pipeline::{Pipeline, PipelineOptions, PipelineResponse, Stage};
pub use route::{Route, RouteDefinition, SchemaRole};
pub use schema::{
    check, compile, describe, validate, CompiledSchema, SchemaDescription, ValidationDetail,
    ValidationError,
};
