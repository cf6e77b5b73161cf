//! YAML config loading for the gateway.
//!
//! Parsing is strict: unknown keys anywhere are rejected, then `validate()`
//! range-checks the values and compiles every policy entry once so a bad
//! rule fails at load time rather than at first use.

pub mod schema;

use std::fs;
use std::path::Path;

use farmauth_core::error::{AuthError, Result};

pub use schema::{
    AuditSection, FarmAuthConfig, GrantConfig, PolicySection, RateLimitSection, RuleConfig,
    SecuritySection, TokenSection,
};

/// Read and validate a config file. Errors name the offending path.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<FarmAuthConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        AuthError::Internal(format!("read config {} failed: {e}", path.display()))
    })?;
    load_from_str(&s).map_err(|e| match e {
        AuthError::BadRequest(msg) => AuthError::BadRequest(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn load_from_str(s: &str) -> Result<FarmAuthConfig> {
    let cfg: FarmAuthConfig = serde_yaml::from_str(s)
        .map_err(|e| AuthError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
