#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use ed25519_dalek::SigningKey;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

use farmauth_core::{AuthError, ClientCode, TokenError};
use farmauth_gateway::clock::{Clock, ManualClock};
use farmauth_gateway::token::TokenValidator;

const HOUR: Duration = Duration::from_secs(3600);

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()))
}

fn reason(err: AuthError) -> TokenError {
    assert_eq!(err.to_string(), "invalid token");
    assert_eq!(err.client_code(), ClientCode::Unauthenticated);
    err.token_reason().expect("token error")
}

#[test]
fn round_trip_preserves_claims() {
    let c = clock();
    let v = TokenValidator::with_clock("farmauth", HOUR, c.clone()).unwrap();

    let token = v.generate_token("u1", "org1", ["admin", "field_agent"]).unwrap();
    let claims = v.validate_token(&token).unwrap();

    assert_eq!(claims.subject, "u1");
    assert_eq!(claims.org_id, "org1");
    assert_eq!(claims.roles, vec!["admin".to_string(), "field_agent".to_string()]);
    assert_eq!(claims.issuer, "farmauth");
    assert_eq!(claims.issued_at, c.now());
    assert_eq!(claims.expires_at, c.now() + chrono::Duration::hours(1));
}

#[test]
fn system_clock_round_trip() {
    let v = TokenValidator::new("farmauth", HOUR).unwrap();
    let token = v.generate_token("u1", "org1", ["admin"]).unwrap();
    let claims = v.validate_token(&token).unwrap();
    assert_eq!(claims.subject, "u1");
    assert!(claims.has_role("admin"));
}

#[test]
fn expired_after_validity() {
    let c = clock();
    let v = TokenValidator::with_clock("farmauth", HOUR, c.clone()).unwrap();
    let token = v.generate_token("u1", "org1", ["admin"]).unwrap();

    c.advance(HOUR - Duration::from_secs(1));
    assert!(v.validate_token(&token).is_ok());

    c.advance(Duration::from_secs(1));
    assert_eq!(reason(v.validate_token(&token).unwrap_err()), TokenError::Expired);
}

#[test]
fn other_validator_rejects_signature() {
    let a = TokenValidator::new("farmauth", HOUR).unwrap();
    let b = TokenValidator::new("farmauth", HOUR).unwrap();
    assert_ne!(a.public_key_bytes(), b.public_key_bytes());

    let token = a.generate_token("u1", "org1", ["admin"]).unwrap();
    assert_eq!(reason(b.validate_token(&token).unwrap_err()), TokenError::BadSignature);
}

#[test]
fn issuer_mismatch_with_shared_key() {
    let key = SigningKey::from_bytes(&[7u8; 32]);
    let a = TokenValidator::from_signing_key("farmauth", HOUR, key.clone(), clock()).unwrap();
    let b = TokenValidator::from_signing_key("someone-else", HOUR, key, clock()).unwrap();
    assert_eq!(a.public_key_bytes(), b.public_key_bytes());

    let token = a.generate_token("u1", "org1", ["admin"]).unwrap();
    assert!(a.validate_token(&token).is_ok());
    assert_eq!(reason(b.validate_token(&token).unwrap_err()), TokenError::IssuerMismatch);
}

#[test]
fn symmetric_algorithm_is_rejected() {
    let c = clock();
    let v = TokenValidator::with_clock("farmauth", HOUR, c.clone()).unwrap();
    let now = c.now().timestamp();
    let forged = encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": "u1",
            "org_id": "org1",
            "roles": ["admin"],
            "iss": "farmauth",
            "iat": now,
            "exp": now + 3600,
        }),
        &EncodingKey::from_secret(b"guessable"),
    )
    .unwrap();

    assert_eq!(reason(v.validate_token(&forged).unwrap_err()), TokenError::UnexpectedAlgorithm);
}

#[test]
fn garbage_is_malformed() {
    let v = TokenValidator::new("farmauth", HOUR).unwrap();
    for bad in ["", "not-a-token", "a.b.c", "only.two"] {
        assert_eq!(reason(v.validate_token(bad).unwrap_err()), TokenError::Malformed, "{bad:?}");
    }
}

#[test]
fn peek_identity_reads_unverified_claims() {
    let c = clock();
    let v = TokenValidator::with_clock("farmauth", HOUR, c.clone()).unwrap();
    let token = v.generate_token("u9", "org3", Vec::<String>::new()).unwrap();

    c.advance(HOUR * 2);
    assert!(v.validate_token(&token).is_err());
    assert_eq!(v.peek_identity(&token), Some(("u9".to_string(), "org3".to_string())));
    assert_eq!(v.peek_identity("garbage"), None);
}

#[test]
fn constructor_rejects_bad_settings() {
    assert!(matches!(TokenValidator::new("", HOUR), Err(AuthError::BadRequest(_))));
    assert!(matches!(
        TokenValidator::new("farmauth", Duration::ZERO),
        Err(AuthError::BadRequest(_))
    ));
}

#[test]
fn debug_does_not_print_keys() {
    let v = TokenValidator::new("farmauth", HOUR).unwrap();
    let s = format!("{v:?}");
    assert!(s.contains("farmauth"));
    assert!(!s.contains("key"));
}
