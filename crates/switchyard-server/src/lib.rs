//! axum server shell for Switchyard.
//!
//! This crate turns the transport-independent pieces of `switchyard-lib` into
//! a running HTTP service:
//!
//! - [`RouteRegistry`]: collects route definitions from registrars and wires
//!   each one into an axum `MethodRouter`
//! - [`Server`]: runs registrars, registers the discovery route, applies the
//!   prefix, and listens
//! - [`ServerConfig`]: defaults, environment overrides, and builders
//! - [`health`] probes, [`metrics`], and the [`middleware`] that assigns
//!   request ids
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  MetricsLayer (request id, span, HTTP metrics)                │
//! │  └─ axum Router (prefix nest, /health/*, /metrics)            │
//! │     └─ endpoint: read_input → Pipeline::run → ServiceResponse │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! Enable the `test-utils` feature to use [`test_utils`] from dependent crates.

#![deny(warnings)]

pub mod config;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod registry;
mod request;
mod response;
mod server;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::ServerConfig;
pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_handler_failure, record_pipeline_outcome,
    record_validation_failure, MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId};
pub use registry::RouteRegistry;
pub use request::{parse_query, read_input};
pub use response::ServiceResponse;
pub use server::{registrar, Registrar, Server, ServerError};
pub use state::AppState;
