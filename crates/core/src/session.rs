//! Bearer sessions and structural token decoding.
//!
//! Tokens are treated as opaque credentials. The only local inspection is
//! structural: the middle dot-separated segment is decoded as base64url JSON
//! to read the `sub` claim for display. Signatures and expiry are never
//! checked here; the backend is the sole authority on validity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use crate::Time;

/// An authenticated session, identified by its bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: String,
}

impl Session {
    /// Wrap a bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    /// The raw bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Decode the token payload.
    pub fn claims(&self) -> Result<Claims, TokenError> {
        let payload = self
            .token
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or(TokenError::MissingPayload)?;

        // Accept padded and standard-alphabet encodings as well.
        let normalized: String = payload
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                c => c,
            })
            .collect();

        let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;

        let sub = value
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .ok_or(TokenError::MissingSubject)?;

        Ok(Claims {
            sub: sub.to_string(),
            exp: value.get("exp").and_then(serde_json::Value::as_i64),
            iat: value.get("iat").and_then(serde_json::Value::as_i64),
        })
    }

    /// The `sub` claim, if the token is structurally valid.
    pub fn subject(&self) -> Result<String, TokenError> {
        self.claims().map(|claims| claims.sub)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .finish()
    }
}

/// Claims read from a token payload. Display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject, the user's email for this backend
    pub sub: String,

    /// Expiry (seconds since epoch), if present
    pub exp: Option<i64>,

    /// Issue time (seconds since epoch), if present
    pub iat: Option<i64>,
}

impl Claims {
    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<Time> {
        self.exp.and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
    }
}

/// Why a token could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Token has no middle segment
    #[error("token has no payload segment")]
    MissingPayload,

    /// Payload is not base64url
    #[error("token payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Payload is not JSON
    #[error("token payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload has no string `sub` claim
    #[error("token payload has no subject")]
    MissingSubject,
}
