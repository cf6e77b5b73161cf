//! farmauth gateway library entry.
//!
//! Wires the policy matrix, token validator, rate limiter and audit log into
//! the authorization gateway that business services call. Consumed by the
//! dry-run binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod audit;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod obs;
pub mod policy;
pub mod ratelimit;
pub mod token;

pub use gateway::AuthorizationGateway;
