//! Transport seam: the caller-supplied function that runs the query.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

/// Transport failures are forwarded to the error hook untouched.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Executes an `OData` query string and returns the decoded JSON payload.
///
/// The payload is either a bare record array or an object carrying the
/// records under the configured result field. Closures of the shape
/// `Fn(String) -> impl Future<Output = Result<Value, TransportError>>`
/// implement this trait directly.
#[async_trait]
pub trait ODataTransport: Send + Sync {
    /// # Errors
    /// Any network or backend failure.
    async fn call_api(&self, query: &str) -> Result<Value, TransportError>;
}

#[async_trait]
impl<F, Fut> ODataTransport for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, TransportError>> + Send,
{
    async fn call_api(&self, query: &str) -> Result<Value, TransportError> {
        (self)(query.to_owned()).await
    }
}
