//! Compile textual policy entries (config, dry-run input) into matrix rules.
//!
//! `"*"` is read as the wildcard here, at the text boundary only. Grants use
//! the `resource:action` form, where either side may be `*`.

use farmauth_core::error::{AuthError, Result};
use farmauth_core::policy::MatchField;

/// Parse one rule field. An empty object is allowed and means "any object";
/// every other field must be non-empty.
pub fn compile_field(name: &str, raw: &str) -> Result<MatchField> {
    match raw {
        "*" => Ok(MatchField::Any),
        "" if name == "object" => Ok(MatchField::Any),
        "" => Err(AuthError::BadRequest(format!("policy rule field `{name}` must not be empty"))),
        v => Ok(MatchField::literal(v)),
    }
}

/// Compiled `resource:action` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub resource: MatchField,
    pub action: MatchField,
}

pub fn compile_grants(raw: &[String]) -> Result<Vec<Grant>> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let (resource, action) = s.split_once(':').ok_or_else(|| {
            AuthError::BadRequest(format!("invalid grant entry: {s} (expected resource:action)"))
        })?;
        out.push(Grant {
            resource: compile_field("resource", resource)?,
            action: compile_field("action", action)?,
        });
    }
    Ok(out)
}
