//! Per-request orchestration.
//!
//! Each request moves through a fixed sequence of stages:
//!
//! ```text
//! Received → InputMerged → Validated ──────→ HandlerInvoked → OutputValidated ───────→ Responded
//!                        ↘ ValidationFailed (422)           ↘ OutputValidationFailed (500)
//! ```
//!
//! Handler failures (an `Err`, a panic, or a timeout) end the request with a
//! 500. Every failure is rendered as an [`ErrorBody`]; nothing escapes the
//! pipeline.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::context::{RequestContext, RequestInput};
use crate::error_body::{ErrorBody, PipelineError};
use crate::handler::HandlerError;
use crate::route::Route;

/// Request lifecycle stages, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    InputMerged,
    Validated,
    ValidationFailed,
    HandlerInvoked,
    OutputValidated,
    OutputValidationFailed,
    Responded,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::InputMerged => "input_merged",
            Stage::Validated => "validated",
            Stage::ValidationFailed => "validation_failed",
            Stage::HandlerInvoked => "handler_invoked",
            Stage::OutputValidated => "output_validated",
            Stage::OutputValidationFailed => "output_validation_failed",
            Stage::Responded => "responded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline behavior shared by every route of a server.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Include `stack` in error bodies.
    pub expose_stack: bool,
    /// Fail handlers that run longer than this.
    pub handler_timeout: Option<Duration>,
}

/// Outcome of running one request through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResponse {
    pub status: StatusCode,
    /// JSON body; `None` means an empty response.
    pub body: Option<Value>,
    /// Error name when the request failed.
    pub failure: Option<&'static str>,
    /// Cause of the failure, see [`PipelineError::reason`].
    pub reason: Option<&'static str>,
}

impl PipelineResponse {
    /// Render a pipeline error as a response.
    pub fn from_error(error: &PipelineError, expose_stack: bool) -> Self {
        let body = ErrorBody::from_error(error, expose_stack);
        Self {
            status: error.status(),
            body: serde_json::to_value(body).ok(),
            failure: Some(error.name()),
            reason: Some(error.reason()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs requests for registered routes.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: PipelineOptions,
    routes: Option<Arc<[Arc<Route>]>>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            routes: None,
        }
    }

    /// Expose `routes` to handlers through [`RequestContext::routes`].
    pub fn with_routes(mut self, routes: Arc<[Arc<Route>]>) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run `input` through `route`, always producing a response.
    pub async fn run(&self, route: &Route, input: RequestInput) -> PipelineResponse {
        let request_id = input.request_id.clone();

        match self.execute(route, input).await {
            Ok(response) => {
                trace_stage(route, &request_id, Stage::Responded);
                response
            }
            Err(failure) => self.reject(route, &request_id, &failure),
        }
    }

    /// Log and render a failure detected outside [`Self::run`], such as a
    /// request body the transport could not parse.
    pub fn reject(
        &self,
        route: &Route,
        request_id: &str,
        failure: &PipelineError,
    ) -> PipelineResponse {
        log_failure(route, request_id, failure);
        PipelineResponse::from_error(failure, self.options.expose_stack)
    }

    async fn execute(
        &self,
        route: &Route,
        input: RequestInput,
    ) -> Result<PipelineResponse, PipelineError> {
        let request_id = input.request_id.clone();
        trace_stage(route, &request_id, Stage::Received);

        let mut ctx = RequestContext::from_input(input);
        if let Some(routes) = &self.routes {
            ctx.set_routes(Arc::clone(routes));
        }
        trace_stage(route, &request_id, Stage::InputMerged);

        if let Some(schema) = route.input_schema() {
            match schema.validate(ctx.input()) {
                Ok(validated) => ctx.set_input(validated),
                Err(e) => {
                    trace_stage(route, &request_id, Stage::ValidationFailed);
                    return Err(PipelineError::InputValidation(e));
                }
            }
        }
        trace_stage(route, &request_id, Stage::Validated);

        let response = ctx.response().clone();
        let returned = self.invoke(route, ctx).await?;
        trace_stage(route, &request_id, Stage::HandlerInvoked);

        let (status, written) = response.take();
        let body = returned.or(written);

        if let (Some(schema), Some(body)) = (route.output_schema(), body.as_ref()) {
            if let Err(e) = schema.check(body) {
                trace_stage(route, &request_id, Stage::OutputValidationFailed);
                return Err(PipelineError::OutputValidation(e));
            }
            trace_stage(route, &request_id, Stage::OutputValidated);
        }

        let status = status.unwrap_or(if body.is_some() {
            StatusCode::OK
        } else {
            StatusCode::NO_CONTENT
        });

        Ok(PipelineResponse {
            status,
            body,
            failure: None,
            reason: None,
        })
    }

    /// Run the handler on its own task so a panic only fails this request.
    async fn invoke(
        &self,
        route: &Route,
        ctx: RequestContext,
    ) -> Result<Option<Value>, PipelineError> {
        let handler = Arc::clone(route.handler());
        let mut task = tokio::spawn(async move { handler.call(ctx).await });

        let joined = match self.options.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(PipelineError::HandlerTimedOut {
                        after_ms: limit.as_millis(),
                    });
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PipelineError::Handler(e)),
            Err(join_error) if join_error.is_panic() => Err(PipelineError::HandlerPanicked(
                panic_message(join_error.into_panic()),
            )),
            Err(_) => Err(PipelineError::Handler(HandlerError::msg(
                "handler task was cancelled",
            ))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn trace_stage(route: &Route, request_id: &str, stage: Stage) {
    debug!(
        request_id = %request_id,
        method = %route.method(),
        route = %route.path(),
        stage = %stage,
        "pipeline stage"
    );
}

fn log_failure(route: &Route, request_id: &str, failure: &PipelineError) {
    match failure {
        PipelineError::InputValidation(e) => warn!(
            request_id = %request_id,
            route = %route.path(),
            count = e.count(),
            detail = %e.message,
            "input validation failed"
        ),
        PipelineError::BodyParse(_) | PipelineError::QueryParse(_) => warn!(
            request_id = %request_id,
            route = %route.path(),
            error = %failure,
            "malformed request"
        ),
        PipelineError::OutputValidation(e) => error!(
            request_id = %request_id,
            route = %route.path(),
            count = e.count(),
            detail = %e.message,
            "handler result violates output schema"
        ),
        PipelineError::Handler(e) => error!(
            request_id = %request_id,
            route = %route.path(),
            error = %e,
            stack = %e.stack(),
            "handler failed"
        ),
        PipelineError::HandlerPanicked(_) | PipelineError::HandlerTimedOut { .. } => error!(
            request_id = %request_id,
            route = %route.path(),
            error = %failure,
            "handler failed"
        ),
    }
}
