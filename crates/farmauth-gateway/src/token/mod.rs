//! Bearer token issue/verify.
//!
//! Every rejection reason collapses to `AuthError::InvalidToken` at the
//! boundary; the reason survives only for logs.

pub mod validator;

pub use validator::TokenValidator;
