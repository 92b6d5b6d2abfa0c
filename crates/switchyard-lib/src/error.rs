use thiserror::Error;

use crate::method::Method;
use crate::route::SchemaRole;

/// Convenient result alias for the Switchyard library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A route definition was rejected at registration time.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A schema document could not be compiled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Wrapper for JSON serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Raised when a schema document is not a valid JSON Schema.
#[derive(Debug, Clone, Error)]
#[error("invalid schema: {message}")]
pub struct SchemaError {
    /// Message reported by the schema compiler.
    pub message: String,
}

/// Errors raised while registering a route.
///
/// Registration runs during single-threaded startup, so every variant here is
/// fatal: the server refuses to start with a malformed route table.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A route with an overlapping `(method, path)` pair is already registered.
    #[error("route {method} {path} is already registered{}", format_existing(.existing))]
    DuplicateRoute {
        method: Method,
        path: String,
        existing: Method,
    },

    /// The route path cannot be handed to the router.
    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The path is ambiguous with an already registered path, such as
    /// `/items/{item_id}` next to `/items/{id}`.
    #[error("route path '{path}' conflicts with registered path '{existing}'")]
    PathConflict { path: String, existing: String },

    /// One of the route's schemas failed to compile.
    #[error("invalid {role} schema for route {method} {path}: {source}")]
    InvalidSchema {
        method: Method,
        path: String,
        role: SchemaRole,
        #[source]
        source: SchemaError,
    },
}

fn format_existing(existing: &Method) -> String {
    if *existing == Method::All {
        " (an ALL route already covers this path)".to_string()
    } else {
        format!(" (conflicts with {existing})")
    }
}
