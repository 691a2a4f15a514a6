//! Body validation shared by the server's create handler and by callers that
//! want to reject input before a round-trip.

use thiserror::Error;

/// Upper bound on a todo body, in characters, after trimming.
pub const MAX_BODY_CHARS: usize = 200;

/// Reasons a todo body is rejected. The `Display` text is the user-facing
/// message sent in the `error` field of a 400 response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Todo body cannot be empty")]
    EmptyBody,

    #[error("Todo body must be 200 characters or less")]
    BodyTooLong,
}

/// Trim `raw` and check it against the body rules, returning the text to store.
pub fn normalize_body(raw: &str) -> Result<&str, ValidationError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(ValidationError::EmptyBody);
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ValidationError::BodyTooLong);
    }
    Ok(body)
}
