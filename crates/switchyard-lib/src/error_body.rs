//! Uniform JSON error bodies for failed requests.
//!
//! Every per-request failure is converted into an [`ErrorBody`] at the pipeline
//! boundary:
//!
//! ```json
//! {
//!   "name": "InputValidationError",
//!   "status": 422,
//!   "message": "\"qty\" is a required property",
//!   "error": { "name": "ValidationError", "message": "...", "details": [...] },
//!   "count": 1,
//!   "data": [{ "message": "...", "path": "", "schemaPath": "/required" }]
//! }
//! ```
//!
//! `stack` is only present when the pipeline is configured to expose it.

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::handler::HandlerError;
use crate::schema::{ValidationDetail, ValidationError};

/// Error name for request input that fails its schema.
pub const INPUT_VALIDATION_ERROR: &str = "InputValidationError";

/// Error name for a handler that failed, panicked, or timed out.
pub const HANDLER_ERROR: &str = "HandlerError";

/// Error name for a handler result that violates the output schema.
pub const OUTPUT_VALIDATION_ERROR: &str = "OutputValidationError";

/// Error name for a request body that could not be read or parsed.
pub const BODY_PARSE_ERROR: &str = "BodyParseError";

/// Error name for a query string that could not be decoded.
pub const QUERY_PARSE_ERROR: &str = "QueryParseError";

/// Failures the pipeline turns into error responses.
#[derive(Debug)]
pub enum PipelineError {
    /// Client input violated the route's input schema.
    InputValidation(ValidationError),
    /// The handler returned an error.
    Handler(HandlerError),
    /// The handler task panicked.
    HandlerPanicked(String),
    /// The handler did not finish within the configured timeout.
    HandlerTimedOut { after_ms: u128 },
    /// The handler result violated the route's output schema.
    OutputValidation(ValidationError),
    /// The request body could not be read or parsed as JSON.
    BodyParse(String),
    /// The query string could not be decoded.
    QueryParse(String),
}

impl PipelineError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::InputValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::BodyParse(_) | PipelineError::QueryParse(_) => StatusCode::BAD_REQUEST,
            PipelineError::Handler(_)
            | PipelineError::HandlerPanicked(_)
            | PipelineError::HandlerTimedOut { .. }
            | PipelineError::OutputValidation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error name placed in the body.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineError::InputValidation(_) => INPUT_VALIDATION_ERROR,
            PipelineError::Handler(_)
            | PipelineError::HandlerPanicked(_)
            | PipelineError::HandlerTimedOut { .. } => HANDLER_ERROR,
            PipelineError::OutputValidation(_) => OUTPUT_VALIDATION_ERROR,
            PipelineError::BodyParse(_) => BODY_PARSE_ERROR,
            PipelineError::QueryParse(_) => QUERY_PARSE_ERROR,
        }
    }

    /// Short machine-readable cause, used as a metrics label.
    ///
    /// Validation and parse failures report where they happened (`input`,
    /// `output`, `body`, `query`); handler failures report how the handler
    /// failed (`error`, `panic`, `timeout`).
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::InputValidation(_) => "input",
            PipelineError::OutputValidation(_) => "output",
            PipelineError::BodyParse(_) => "body",
            PipelineError::QueryParse(_) => "query",
            PipelineError::Handler(_) => "error",
            PipelineError::HandlerPanicked(_) => "panic",
            PipelineError::HandlerTimedOut { .. } => "timeout",
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        match self {
            PipelineError::InputValidation(e) | PipelineError::OutputValidation(e) => {
                e.message.clone()
            }
            PipelineError::Handler(e) => e.message(),
            PipelineError::HandlerPanicked(reason) => format!("handler panicked: {reason}"),
            PipelineError::HandlerTimedOut { after_ms } => {
                format!("handler timed out after {after_ms}ms")
            }
            PipelineError::BodyParse(reason) => format!("invalid request body: {reason}"),
            PipelineError::QueryParse(reason) => format!("invalid query string: {reason}"),
        }
    }

    fn validation(&self) -> Option<&ValidationError> {
        match self {
            PipelineError::InputValidation(e) | PipelineError::OutputValidation(e) => Some(e),
            _ => None,
        }
    }

    fn stack(&self) -> String {
        match self {
            PipelineError::Handler(e) => e.stack(),
            other => format!("{}: {}", other.name(), other.message()),
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

/// The raised error, as carried in [`ErrorBody::error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ValidationDetail>,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub name: String,
    pub status: u16,
    pub message: String,
    pub error: ErrorObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<ValidationDetail>>,
}

impl ErrorBody {
    /// Format `error` for a response with `status`.
    ///
    /// Validation errors fill `count` and `data`; `stack` is only set when
    /// `expose_stack` is true.
    pub fn new(status: StatusCode, error: &PipelineError, expose_stack: bool) -> Self {
        let message = error.message();
        let validation = error.validation();

        let error_object = match validation {
            Some(validation) => ErrorObject {
                name: validation.name.clone(),
                message: validation.message.clone(),
                details: validation.details.clone(),
            },
            None => ErrorObject {
                name: error.name().to_string(),
                message: message.clone(),
                details: Vec::new(),
            },
        };

        Self {
            name: error.name().to_string(),
            status: status.as_u16(),
            message,
            error: error_object,
            stack: expose_stack.then(|| error.stack()),
            count: validation.map(ValidationError::count),
            data: validation.map(|v| v.details.clone()),
        }
    }

    /// Format `error` with its own status.
    pub fn from_error(error: &PipelineError, expose_stack: bool) -> Self {
        Self::new(error.status(), error, expose_stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(message: &str, path: &str) -> ValidationDetail {
        ValidationDetail {
            message: message.to_string(),
            path: path.to_string(),
            schema_path: "/required".to_string(),
        }
    }

    #[test]
    fn validation_errors_fill_count_and_data() {
        let error = PipelineError::InputValidation(ValidationError::from_details(vec![
            detail("\"qty\" is a required property", ""),
            detail("/name: 5 is not of type \"string\"", "/name"),
        ]));
        let body = ErrorBody::from_error(&error, false);

        assert_eq!(body.status, 422);
        assert_eq!(body.name, INPUT_VALIDATION_ERROR);
        assert_eq!(
            body.message,
            "\"qty\" is a required property; /name: 5 is not of type \"string\""
        );
        assert_eq!(body.count, Some(2));
        assert_eq!(body.data.as_ref().map(Vec::len), Some(2));
        assert_eq!(body.error.details.len(), 2);
        assert!(body.stack.is_none());
    }

    #[test]
    fn handler_errors_carry_message_only() {
        let error = PipelineError::Handler(HandlerError::msg("database unavailable"));
        let body = ErrorBody::from_error(&error, false);

        assert_eq!(body.status, 500);
        assert_eq!(body.name, HANDLER_ERROR);
        assert_eq!(body.message, "database unavailable");
        assert!(body.count.is_none());
        assert!(body.data.is_none());

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stack").is_none());
        assert!(json.get("count").is_none());
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn stack_is_gated() {
        let error = PipelineError::Handler(HandlerError::msg("boom"));
        let body = ErrorBody::from_error(&error, true);
        assert!(body.stack.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn output_validation_is_a_server_error() {
        let error = PipelineError::OutputValidation(ValidationError::from_details(vec![detail(
            "\"id\" is a required property",
            "",
        )]));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.name(), OUTPUT_VALIDATION_ERROR);
    }

    #[test]
    fn timeouts_and_panics_are_handler_errors() {
        let timeout = PipelineError::HandlerTimedOut { after_ms: 250 };
        assert_eq!(timeout.name(), HANDLER_ERROR);
        assert!(timeout.message().contains("250ms"));

        let panic = PipelineError::HandlerPanicked("index out of bounds".to_string());
        assert_eq!(panic.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn handler_failures_keep_distinct_reasons() {
        let failures = [
            PipelineError::Handler(HandlerError::msg("nope")),
            PipelineError::HandlerPanicked("boom".to_string()),
            PipelineError::HandlerTimedOut { after_ms: 10 },
        ];
        let reasons: Vec<_> = failures.iter().map(PipelineError::reason).collect();
        assert_eq!(reasons, vec!["error", "panic", "timeout"]);
        assert!(failures.iter().all(|f| f.name() == HANDLER_ERROR));

        assert_eq!(PipelineError::BodyParse("eof".to_string()).reason(), "body");
        assert_eq!(PipelineError::QueryParse("bad".to_string()).reason(), "query");
    }
}
