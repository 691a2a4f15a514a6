//! Error types for the todo API client.
//!
//! # Design
//! A 400 carries a human-readable reason in `{"error": ...}` that callers
//! usually show as-is, so it gets its own `Rejected` variant. Every other
//! unexpected status lands in `HttpError` with the best message available.

use thiserror::Error;

/// Errors returned by `TodoClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server refused the request with 400, e.g. an empty body or a
    /// duplicate todo.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The server returned some other unexpected status.
    #[error("HTTP {status}: {message}")]
    HttpError { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload or query could not be serialized.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}
