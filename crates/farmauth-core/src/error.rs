//! Shared error type across farmauth crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
///
/// Business services map these onto their own transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Denied by policy or throttled.
    Forbidden,
    /// Missing or invalid bearer credential.
    Unauthenticated,
    /// Invalid input / malformed configuration.
    BadRequest,
    /// Internal failure.
    Internal,
}

impl ClientCode {
    /// String representation used in service responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::Forbidden => "FORBIDDEN",
            ClientCode::Unauthenticated => "UNAUTHENTICATED",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Why a token was rejected.
///
/// Kept for internal logging only. Every variant surfaces to callers as
/// [`AuthError::InvalidToken`], whose message does not reveal the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Not a parseable token (bad segments, base64, json, missing claims).
    Malformed,
    /// Header algorithm differs from the validator's.
    UnexpectedAlgorithm,
    /// Signature does not verify against the public key.
    BadSignature,
    /// `now >= expires_at`.
    Expired,
    /// Issuer claim differs from the validator's issuer.
    IssuerMismatch,
}

impl TokenError {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::UnexpectedAlgorithm => "unexpected_algorithm",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
            TokenError::IssuerMismatch => "issuer_mismatch",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("rate limit exceeded")]
    RateLimitExceeded { key: String },
    #[error("invalid token")]
    InvalidToken { reason: TokenError },
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn invalid_token(reason: TokenError) -> Self {
        AuthError::InvalidToken { reason }
    }

    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            AuthError::RateLimitExceeded { .. } => ClientCode::Forbidden,
            AuthError::InvalidToken { .. } => ClientCode::Unauthenticated,
            AuthError::BadRequest(_) | AuthError::UnsupportedVersion => ClientCode::BadRequest,
            AuthError::Signing(_) | AuthError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Internal rejection reason for token failures, for logs only.
    pub fn token_reason(&self) -> Option<TokenError> {
        match self {
            AuthError::InvalidToken { reason } => Some(*reason),
            _ => None,
        }
    }
}
