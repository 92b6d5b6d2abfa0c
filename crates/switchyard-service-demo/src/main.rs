//! Switchyard demo HTTP service.
//!
//! Serves the routes from [`switchyard_service_demo::registrars`] plus the
//! built-in endpoints:
//!
//! - `GET /.well-known/routes` - route discovery
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live` - Kubernetes liveness probe
//! - `GET /health/ready` - Kubernetes readiness probe
//!
//! # Configuration
//!
//! Flags override the environment, which overrides the defaults. `--help`
//! names the variable behind each flag.
//!
//! - `SERVICE_PORT` / `--port` - HTTP port (default: 3000)
//! - `ROUTE_PREFIX` / `--prefix` - path prefix for demo routes
//! - `EXPOSE_STACK` / `--expose-stack` - include error stacks in responses
//! - `HANDLER_TIMEOUT_MS` / `--handler-timeout-ms` - per-request handler limit
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text

use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use tracing::{info, warn};

use switchyard_server::{
    init_logging, init_metrics, LogFormat, LoggingConfig, MetricsConfig, Server, ServerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Switchyard demo HTTP service")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "SERVICE_PORT")]
    port: Option<u16>,

    /// Path prefix applied to every demo route.
    #[arg(long, env = "ROUTE_PREFIX")]
    prefix: Option<String>,

    /// Disable the route discovery endpoint.
    #[arg(long)]
    no_meta_route: bool,

    /// Include error stacks in handler error responses.
    #[arg(long, env = "EXPOSE_STACK", value_parser = BoolishValueParser::new())]
    expose_stack: bool,

    /// Abort handlers that run longer than this many milliseconds.
    #[arg(long, env = "HANDLER_TIMEOUT_MS", value_name = "MS")]
    handler_timeout_ms: Option<u64>,

    /// Log format: json or text.
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(prefix) = &self.prefix {
            config = config.with_prefix(prefix.clone());
        }
        if self.no_meta_route {
            config = config.with_meta_route(false);
        }
        if self.expose_stack {
            config = config.with_expose_stack(true);
        }
        if let Some(ms) = self.handler_timeout_ms {
            config = config.with_handler_timeout(Duration::from_millis(ms));
        }
        config
    }

    fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::from_env().with_service("demo");
        match self.log_format {
            Some(format) => config.with_format(format),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.logging_config()) {
        eprintln!("logging already initialized: {e}");
    }

    if let Err(e) = init_metrics(&MetricsConfig::from_env()) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = cli.server_config();
    info!(port = config.port, prefix = ?config.prefix, "starting demo service");

    let server = Server::new(config, switchyard_service_demo::registrars())
        .context("failed to initialize the demo server")?;
    server.serve().await.context("demo server stopped with an error")?;

    Ok(())
}
