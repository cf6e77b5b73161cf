//! Identity claims carried by a bearer token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verified identity assertions, produced by token validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub subject: String,
    pub org_id: String,
    pub roles: Vec<String>,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Expiry is exclusive: a token is dead at `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
