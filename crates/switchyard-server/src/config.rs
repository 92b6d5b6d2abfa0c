//! Server configuration.
//!
//! # Environment Variables
//!
//! | variable             | field               | default                |
//! |----------------------|---------------------|------------------------|
//! | `SERVICE_PORT`       | `port`              | `3000`                 |
//! | `SERVICE_NAME`       | `service_name`      | `switchyard`           |
//! | `ROUTE_PREFIX`       | `prefix`            | none                   |
//! | `META_ROUTE`         | `meta_route`        | `true`                 |
//! | `META_ROUTE_PATH`    | `meta_route_path`   | `/.well-known/routes`  |
//! | `META_ROUTE_METHOD`  | `meta_route_method` | `GET`                  |
//! | `EXPOSE_STACK`       | `expose_stack`      | `false`                |
//! | `HANDLER_TIMEOUT_MS` | `handler_timeout`   | none                   |
//! | `BODY_LIMIT_BYTES`   | `body_limit`        | `1048576`              |
//! | `HEALTH_ROUTES`      | `health_routes`     | `true`                 |
//! | `METRICS_ENABLED`, `METRICS_PATH` | `metrics_path` | `/metrics`  |
//!
//! Unparseable values are ignored with a warning and the default is kept.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_lib::{Method, PipelineOptions, DEFAULT_META_ROUTE_PATH};

use crate::metrics::MetricsConfig;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default service name.
pub const DEFAULT_SERVICE_NAME: &str = "switchyard";

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Path prefix applied to every registered route.
    pub prefix: Option<String>,
    /// Register the route discovery endpoint.
    pub meta_route: bool,
    pub meta_route_path: String,
    pub meta_route_method: Method,
    /// Run initialization inside [`Server::new`](crate::Server::new).
    pub init: bool,
    /// Include `stack` in error bodies.
    pub expose_stack: bool,
    pub handler_timeout: Option<Duration>,
    pub body_limit: usize,
    /// Serve `/health/live` and `/health/ready`.
    pub health_routes: bool,
    /// Prometheus endpoint path; `None` disables it.
    pub metrics_path: Option<String>,
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            prefix: None,
            meta_route: true,
            meta_route_path: DEFAULT_META_ROUTE_PATH.to_string(),
            meta_route_method: Method::Get,
            init: true,
            expose_stack: false,
            handler_timeout: None,
            body_limit: DEFAULT_BODY_LIMIT,
            health_routes: true,
            metrics_path: Some("/metrics".to_string()),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let metrics = MetricsConfig::from_env();

        Self {
            port: env_parse("SERVICE_PORT").unwrap_or(defaults.port),
            prefix: env_string("ROUTE_PREFIX").or(defaults.prefix),
            meta_route: env_flag("META_ROUTE").unwrap_or(defaults.meta_route),
            meta_route_path: env_string("META_ROUTE_PATH").unwrap_or(defaults.meta_route_path),
            meta_route_method: env_parse("META_ROUTE_METHOD").unwrap_or(defaults.meta_route_method),
            init: defaults.init,
            expose_stack: env_flag("EXPOSE_STACK").unwrap_or(defaults.expose_stack),
            handler_timeout: env_parse::<u64>("HANDLER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .or(defaults.handler_timeout),
            body_limit: env_parse("BODY_LIMIT_BYTES").unwrap_or(defaults.body_limit),
            health_routes: env_flag("HEALTH_ROUTES").unwrap_or(defaults.health_routes),
            metrics_path: metrics.endpoint().map(str::to_string),
            service_name: env_string("SERVICE_NAME").unwrap_or(defaults.service_name),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_meta_route(mut self, enabled: bool) -> Self {
        self.meta_route = enabled;
        self
    }

    pub fn with_meta_route_at(mut self, method: Method, path: impl Into<String>) -> Self {
        self.meta_route_method = method;
        self.meta_route_path = path.into();
        self
    }

    /// Defer initialization to an explicit [`Server::init`](crate::Server::init) call.
    pub fn with_deferred_init(mut self) -> Self {
        self.init = false;
        self
    }

    pub fn with_expose_stack(mut self, expose: bool) -> Self {
        self.expose_stack = expose;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn with_health_routes(mut self, enabled: bool) -> Self {
        self.health_routes = enabled;
        self
    }

    pub fn with_metrics_path(mut self, path: Option<String>) -> Self {
        self.metrics_path = path;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Options for the request pipeline.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            expose_stack: self.expose_stack,
            handler_timeout: self.handler_timeout,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = env_string(key)?;
    parse_flag(&raw).or_else(|| {
        tracing::warn!(variable = key, value = %raw, "ignoring unparseable boolean");
        None
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
