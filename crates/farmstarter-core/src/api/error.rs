use serde::Deserialize;
use thiserror::Error;

use crate::auth::DecodeError;

/// Failures surfaced by the API client and the session layer.
///
/// Remote-call variants carry a message that is safe to show next to a form:
/// either the server's own `detail` text or a fixed fallback.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Registration(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    SignOut(String),

    #[error("{0}")]
    Fetch(String),

    #[error(transparent)]
    MalformedCredential(#[from] DecodeError),

    #[error("Token storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// The user-facing message for remote-call failures
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Which call failed; picks the error variant and its fallback message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    SignIn,
    SignOut,
    ListUsers,
    GetUser,
}

impl Operation {
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::Register => "Registration failed",
            Operation::SignIn => "Invalid email or password.",
            Operation::SignOut => "Sign out failed",
            Operation::ListUsers => "Failed to fetch users",
            Operation::GetUser => "Failed to fetch profile.",
        }
    }

    pub fn error(self, message: impl Into<String>) -> AuthError {
        let message = message.into();
        match self {
            Operation::Register => AuthError::Registration(message),
            Operation::SignIn => AuthError::Authentication(message),
            Operation::SignOut => AuthError::SignOut(message),
            Operation::ListUsers | Operation::GetUser => AuthError::Fetch(message),
        }
    }

    /// Error carrying the fixed fallback message
    pub fn fallback(self) -> AuthError {
        self.error(self.fallback_message())
    }

    /// Normalize a non-success response body into this operation's error
    pub fn from_body(self, body: &str) -> AuthError {
        match detail_message(body) {
            Some(detail) => self.error(detail),
            None => self.fallback(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Extract a string `detail` field from an error body.
///
/// Validation errors sometimes send `detail` as a list of objects; those are
/// not shown verbatim and fall back to the operation's message.
fn detail_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        _ => None,
    }
}

/// Maximum length for error response bodies in log lines
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}
