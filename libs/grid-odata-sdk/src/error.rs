use crate::transport::TransportError;

/// Errors surfaced by [`crate::GridODataProvider`].
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// The transport rejected; the source is the transport's own error.
    #[error("transport failed: {0}")]
    Transport(#[source] TransportError),

    /// Query translation or response decoding failed.
    #[error(transparent)]
    Query(#[from] grid_odata::Error),

    /// The request was canceled before its result was applied.
    #[error("request canceled")]
    Canceled,
}

impl ProviderError {
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, ProviderError::Canceled)
    }
}
