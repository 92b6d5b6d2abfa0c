//! Liveness and readiness probes.
//!
//! Both endpoints live outside the route prefix at `/health/live` and
//! `/health/ready`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Probe response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `ok`, or `not_ready: <reason>`.
    pub status: String,
    pub service: String,
    pub version: String,
    /// Number of routes added by registrars (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes_registered: Option<usize>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            routes_registered: None,
        }
    }

    pub fn ready(service: &str, version: &str, routes: usize) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            routes_registered: Some(routes),
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {reason}"),
            service: service.to_string(),
            version: version.to_string(),
            routes_registered: Some(0),
        }
    }
}

/// `GET /health/live`: 200 while the process is serving.
///
/// ```text
/// {"status":"ok","service":"switchyard","version":"0.1.0"}
/// ```
pub async fn health_live(State(state): State<AppState>) -> impl IntoResponse {
    let status = HealthStatus::alive(state.service(), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// `GET /health/ready`: 200 once a registrar has added at least one route,
/// else 503. The discovery route does not count.
///
/// ```text
/// {"status":"ok","service":"switchyard","version":"0.1.0","routes_registered":5}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    let routes = state.registered_count();

    if routes == 0 {
        let status = HealthStatus::not_ready(state.service(), version, "no routes registered");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let status = HealthStatus::ready(state.service(), version, routes);
    (StatusCode::OK, Json(status)).into_response()
}
