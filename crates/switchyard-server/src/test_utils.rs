//! Helpers for exercising Switchyard routes in tests.

use axum::Router;

use crate::{Registrar, Server, ServerConfig};

/// Configuration suited to tests: ephemeral port, no metrics endpoint.
pub fn test_config() -> ServerConfig {
    ServerConfig::default()
        .with_port(0)
        .with_service_name("switchyard-test")
        .with_metrics_path(None)
}

/// Build and initialize a server, returning its router.
///
/// # Panics
///
/// Panics if initialization fails; a rejected route table is a test bug.
pub fn test_router(config: ServerConfig, registrars: Vec<Registrar>) -> Router {
    let server = Server::new(config.clone(), registrars)
        .and_then(|mut server| {
            if !server.is_initialized() {
                server.init()?;
            }
            Ok(server)
        })
        .unwrap_or_else(|e| panic!("failed to initialize test server ({config:?}): {e}"));

    server
        .router()
        .unwrap_or_else(|e| panic!("initialized server has no router: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar;
    use switchyard_lib::{HandlerResult, RequestContext, RouteDefinition};

    #[test]
    fn test_config_disables_metrics() {
        let config = test_config();
        assert_eq!(config.port, 0);
        assert!(config.metrics_path.is_none());
    }

    #[test]
    fn test_router_initializes_deferred_servers() {
        let registrars = vec![registrar(|routes| {
            routes.register(RouteDefinition::new("/ok", |_ctx: RequestContext| async {
                HandlerResult::Ok(None)
            }))
        })];
        let _router = test_router(test_config().with_deferred_init(), registrars);
    }
}
