//! Error types for the Pinboard API client.
//!
//! # Design
//! `PinboardError` is the single base error of the crate. Every failure a
//! caller can observe is one of its variants, so `Result<_, PinboardError>`
//! can be handled broadly with `?` or narrowly by matching a variant or its
//! `ErrorKind`.
//!
//! Validation failures (`InvalidArgument`) are raised before any request is
//! built, so they never reach the network.

use thiserror::Error;

/// Errors returned by `PinboardClient` operations.
#[derive(Debug, Error)]
pub enum PinboardError {
    /// Caller-supplied input failed a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport-level failure: DNS, connect, TLS, timeout or an
    /// unclassified failure with no HTTP status.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// The server returned 401.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// The server returned 429. Backing off is up to the caller.
    #[error("too many requests")]
    TooManyRequests,

    /// Any other non-200 status, or a 200 whose body could not be decoded.
    #[error("invalid response (HTTP {status}): {message}")]
    InvalidResponse { status: u16, message: String },
}

/// Fieldless discriminant of `PinboardError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ConnectionError,
    AuthenticationFailure,
    TooManyRequests,
    InvalidResponse,
}

impl PinboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PinboardError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PinboardError::ConnectionError(_) => ErrorKind::ConnectionError,
            PinboardError::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            PinboardError::TooManyRequests => ErrorKind::TooManyRequests,
            PinboardError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
        }
    }

    /// A 200 response whose body did not have the expected shape.
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        PinboardError::InvalidResponse {
            status: 200,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        PinboardError::InvalidArgument(message.into())
    }
}
