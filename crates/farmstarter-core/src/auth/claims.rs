//! Bearer token claim decoding.
//!
//! Access tokens issued by the API are JWTs. The client never holds the
//! signing key, so it only reads the payload segment to learn who is signed
//! in and when the token stops being valid. Signature checks stay on the
//! server.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),
}

impl DecodeError {
    fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::MalformedCredential(reason.into())
    }
}

/// Identity claims carried inside an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier (the server puts the user id here)
    pub sub: String,
    /// Expiry as epoch seconds
    pub exp: i64,
    /// Any other claims the server chose to include
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// A token is expired once the current instant reaches `exp`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Seconds left before expiry, clamped at zero
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }

    /// Look up an optional string claim such as `email` or `role`
    pub fn str_claim(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }
}

/// Decode the claims of a JWT without verifying its signature.
///
/// Fails only on structural problems: wrong segment count, bad base64url,
/// a payload that is not a JSON object, or a missing/ill-typed `sub` or
/// `exp`. Expired tokens decode fine; expiry is the caller's check.
pub fn decode(credential: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = credential.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    // Some issuers pad their segments; the URL-safe alphabet never contains '='
    let payload = segments[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(DecodeError::malformed("empty payload segment"));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| DecodeError::malformed(format!("payload is not base64url: {}", e)))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| DecodeError::malformed(format!("payload is not JSON: {}", e)))?;

    let Value::Object(mut fields) = value else {
        return Err(DecodeError::malformed("payload is not a JSON object"));
    };

    let sub = match fields.remove("sub") {
        Some(Value::String(sub)) => sub,
        Some(_) => return Err(DecodeError::malformed("`sub` claim is not a string")),
        None => return Err(DecodeError::malformed("missing `sub` claim")),
    };

    let exp = match fields.remove("exp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .filter(|exp| *exp >= 0)
            .ok_or_else(|| DecodeError::malformed("`exp` claim is not a non-negative integer"))?,
        Some(_) => return Err(DecodeError::malformed("`exp` claim is not a number")),
        None => return Err(DecodeError::malformed("missing `exp` claim")),
    };

    Ok(Claims {
        sub,
        exp,
        extra: fields,
    })
}
