//! Route handler abstraction.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::RequestContext;

/// What a handler produces: a body, or `None` when the handler wrote the
/// response through [`RequestContext::response`] (or has nothing to send).
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// Error raised by a route handler.
///
/// Any `std::error::Error` converts into a `HandlerError`, so handlers can use
/// `?` freely. Like `anyhow::Error`, this type does not implement
/// `std::error::Error` itself.
pub struct HandlerError {
    inner: anyhow::Error,
}

impl HandlerError {
    /// Create an error from a plain message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self {
            inner: anyhow::Error::msg(message),
        }
    }

    /// Wrap an existing `anyhow::Error`.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Self { inner: error }
    }

    /// Top-level error message.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// Error chain and, when captured, the backtrace.
    pub fn stack(&self) -> String {
        format!("{:?}", self.inner)
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self {
            inner: anyhow::Error::new(error),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// An async route handler.
///
/// Implemented for every `Fn(RequestContext) -> impl Future<Output = HandlerResult>`
/// that is `Send + Sync + 'static`.
pub trait Handler: Send + Sync + 'static {
    /// Invoke the handler for one request.
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx))
    }
}
