//! HTTP rendering of pipeline results.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use switchyard_lib::PipelineResponse;

/// A [`PipelineResponse`] ready to be returned from an axum handler.
///
/// Bodies are written as JSON; a response without a body is sent empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse(pub PipelineResponse);

impl From<PipelineResponse> for ServiceResponse {
    fn from(response: PipelineResponse) -> Self {
        Self(response)
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let PipelineResponse { status, body, .. } = self.0;
        match body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}
