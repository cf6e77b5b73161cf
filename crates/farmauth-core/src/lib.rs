//! farmauth core: the error surface, policy data model, and claims shared by
//! the authorization gateway and the business services that consume it.
//!
//! This crate carries no crypto or locking so services can depend on it
//! without pulling in the gateway.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible
//! path surfaces as `AuthError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod authorizer;
pub mod claims;
pub mod context;
pub mod error;
pub mod policy;

pub use authorizer::Authorizer;
pub use claims::AuthClaims;
pub use context::RequestContext;
pub use error::{AuthError, ClientCode, Result, TokenError};
pub use policy::{AccessRequest, Decision, Effect, MatchField, PolicyRule};
