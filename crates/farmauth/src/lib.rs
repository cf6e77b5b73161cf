//! Top-level facade crate for farmauth.
//!
//! Re-exports core types and the gateway library so business services can
//! depend on a single crate.

pub mod core {
    pub use farmauth_core::*;
}

pub mod gateway {
    pub use farmauth_gateway::*;
}
