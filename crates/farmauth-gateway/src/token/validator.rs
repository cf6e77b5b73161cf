use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use farmauth_core::claims::AuthClaims;
use farmauth_core::error::{AuthError, Result, TokenError};

use crate::clock::{Clock, SystemClock};

/// JWT payload as it travels on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    org_id: String,
    #[serde(default)]
    roles: Vec<String>,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Subject/org read from a token without verifying it. Audit use only.
#[derive(Debug, Deserialize)]
struct UnverifiedIdentity {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    org_id: Option<String>,
}

/// Issues and verifies EdDSA-signed bearer tokens.
///
/// The Ed25519 key pair is generated once at construction. The private half
/// stays inside the encoding key; verification uses the public half only.
pub struct TokenValidator {
    issuer: String,
    validity: Duration,
    validity_delta: chrono::Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key: [u8; 32],
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(issuer: impl Into<String>, validity: Duration) -> Result<Self> {
        Self::with_clock(issuer, validity, Arc::new(SystemClock))
    }

    pub fn with_clock(
        issuer: impl Into<String>,
        validity: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::from_signing_key(issuer, validity, SigningKey::generate(&mut OsRng), clock)
    }

    /// Build around an existing key, e.g. one restored from a secret store.
    pub fn from_signing_key(
        issuer: impl Into<String>,
        validity: Duration,
        signing_key: SigningKey,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let issuer = issuer.into();
        if issuer.is_empty() {
            return Err(AuthError::BadRequest("token issuer must not be empty".into()));
        }
        if validity.is_zero() {
            return Err(AuthError::BadRequest("token validity must be positive".into()));
        }
        let validity_delta = chrono::Duration::from_std(validity)
            .map_err(|_| AuthError::BadRequest("token validity out of range".into()))?;

        let der = signing_key
            .to_pkcs8_der()
            .map_err(|e| AuthError::Signing(format!("encode signing key: {e}")))?;
        let encoding_key = EncodingKey::from_ed_der(der.as_bytes());
        let public_key = signing_key.verifying_key().to_bytes();
        let decoding_key = DecodingKey::from_ed_der(&public_key);

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        // Expiry is checked against the injected clock after decoding.
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            issuer,
            validity,
            validity_delta,
            encoding_key,
            decoding_key,
            public_key,
            validation,
            clock,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Raw Ed25519 public key, for handing to external verifiers.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public_key
    }

    pub fn generate_token<I, S>(&self, subject: &str, org_id: &str, roles: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = self.clock.now();
        let expires = now
            .checked_add_signed(self.validity_delta)
            .ok_or_else(|| AuthError::Signing("token expiry overflows".into()))?;

        let claims = WireClaims {
            sub: subject.to_string(),
            org_id: org_id.to_string(),
            roles: roles.into_iter().map(Into::into).collect(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(&Header::new(Algorithm::EdDSA), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthClaims> {
        let data = decode::<WireClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            let reason = classify(e.kind());
            tracing::debug!(reason = reason.as_str(), error = %e, "token rejected");
            AuthError::invalid_token(reason)
        })?;
        let wire = data.claims;

        if self.clock.now().timestamp() >= wire.exp {
            tracing::debug!(sub = %wire.sub, "token rejected: expired");
            return Err(AuthError::invalid_token(TokenError::Expired));
        }

        Ok(AuthClaims {
            subject: wire.sub,
            org_id: wire.org_id,
            roles: wire.roles,
            issuer: wire.iss,
            issued_at: from_unix(wire.iat)?,
            expires_at: from_unix(wire.exp)?,
        })
    }

    /// Best-effort `(subject, org_id)` from an unverified token, so failed
    /// validations can still be attributed in the audit trail.
    pub fn peek_identity(&self, token: &str) -> Option<(String, String)> {
        let mut insecure = Validation::new(Algorithm::EdDSA);
        insecure.insecure_disable_signature_validation();
        insecure.set_required_spec_claims::<&str>(&[]);
        insecure.validate_exp = false;
        insecure.validate_aud = false;

        let data = decode::<UnverifiedIdentity>(token, &DecodingKey::from_secret(&[]), &insecure).ok()?;
        Some((
            data.claims.sub.unwrap_or_default(),
            data.claims.org_id.unwrap_or_default(),
        ))
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("issuer", &self.issuer)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::InvalidKeyFormat => {
            TokenError::UnexpectedAlgorithm
        }
        ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::invalid_token(TokenError::Malformed))
}
