use thiserror::Error;

use crate::transport::{Response, TransportError};

/// Boxed error produced by external collaborators such as the identity service.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the storage client.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A required construction option is missing or an option is malformed.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The identity service call failed. Never retried by this crate.
    #[error("authentication failed: {0}")]
    Authentication(#[source] BoxError),

    /// A malformed permission code or signing method was supplied.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The service answered with a 404. Carries the original response.
    #[error("resource not found ({})", .response.status)]
    NotFound {
        /// The response that produced the error
        response: Box<Response>,
    },

    /// Any other transport failure, passed through unmodified.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body advertised as JSON could not be decoded.
    #[error("could not decode JSON response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The storage endpoint URL could not be split into scheme, host and port.
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
}

impl StorageError {
    /// Wrap an identity failure given as a plain message.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into().into())
    }

    /// Whether this error is the normalized 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
