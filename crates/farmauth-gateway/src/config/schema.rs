use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use farmauth_core::error::{AuthError, Result};
use farmauth_core::policy::Effect;

use crate::policy::{compile_field, compile_grants, RoleTemplate};
use crate::ratelimit::DEFAULT_MAX_KEYS;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FarmAuthConfig {
    pub version: u32,

    #[serde(default)]
    pub policy: PolicySection,

    #[serde(default)]
    pub security: SecuritySection,

    #[serde(default)]
    pub rate_limit: RateLimitSection,

    #[serde(default)]
    pub token: TokenSection,

    #[serde(default)]
    pub audit: AuditSection,
}

impl FarmAuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(AuthError::UnsupportedVersion);
        }
        self.policy.validate()?;
        self.rate_limit.validate()?;
        self.token.validate()?;
        Ok(())
    }
}

/// Rules are appended in file order, then grants in file order. Put deny
/// exceptions in `rules` so they precede the grants they carve out of.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    #[serde(default = "default_effect")]
    pub default_effect: Effect,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            default_effect: default_effect(),
            rules: Vec::new(),
            grants: Vec::new(),
        }
    }
}

impl PolicySection {
    pub fn validate(&self) -> Result<()> {
        for (i, r) in self.rules.iter().enumerate() {
            r.validate()
                .map_err(|e| AuthError::BadRequest(format!("policy.rules[{i}]: {e}")))?;
        }
        for (i, g) in self.grants.iter().enumerate() {
            g.validate()
                .map_err(|e| AuthError::BadRequest(format!("policy.grants[{i}]: {e}")))?;
        }
        Ok(())
    }
}

/// One explicit rule. `"*"` in any field is the wildcard; `object` may be
/// omitted.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub effect: Effect,
    pub subject: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub object: String,
    pub org: String,
}

impl RuleConfig {
    fn validate(&self) -> Result<()> {
        compile_field("subject", &self.subject)?;
        compile_field("resource", &self.resource)?;
        compile_field("action", &self.action)?;
        compile_field("object", &self.object)?;
        compile_field("org", &self.org)?;
        Ok(())
    }
}

/// Role preset for one subject in one org. `preset: custom` takes its
/// `resource:action` pairs from `allow`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantConfig {
    pub preset: String,
    pub subject: String,
    pub org: String,
    #[serde(default)]
    pub allow: Vec<String>,
}

pub const CUSTOM_PRESET: &str = "custom";

impl GrantConfig {
    fn validate(&self) -> Result<()> {
        compile_field("subject", &self.subject)?;
        compile_field("org", &self.org)?;
        if self.preset == CUSTOM_PRESET {
            if self.allow.is_empty() {
                return Err(AuthError::BadRequest("custom preset needs `allow` entries".into()));
            }
            compile_grants(&self.allow)?;
            return Ok(());
        }
        if RoleTemplate::from_name(&self.preset).is_none() {
            return Err(AuthError::BadRequest(format!("unknown preset: {}", self.preset)));
        }
        if !self.allow.is_empty() {
            return Err(AuthError::BadRequest(format!(
                "`allow` is only valid with preset `{CUSTOM_PRESET}`"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Per-key limit overrides, e.g. `"check_permission:svc-sync": 5000`.
    #[serde(default)]
    pub overrides: BTreeMap<String, u32>,

    /// Tracked keys above which lapsed windows are pruned.
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_ms: default_window_ms(),
            overrides: BTreeMap::new(),
            max_keys: default_max_keys(),
        }
    }
}

impl RateLimitSection {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(AuthError::BadRequest("rate_limit.limit must be at least 1".into()));
        }
        if !(100..=86_400_000).contains(&self.window_ms) {
            return Err(AuthError::BadRequest(
                "rate_limit.window_ms must be between 100 and 86400000".into(),
            ));
        }
        if self.max_keys == 0 {
            return Err(AuthError::BadRequest("rate_limit.max_keys must be at least 1".into()));
        }
        if self.overrides.keys().any(|k| k.is_empty()) {
            return Err(AuthError::BadRequest("rate_limit.overrides keys must not be empty".into()));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default = "default_validity_secs")]
    pub validity_secs: u64,
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            validity_secs: default_validity_secs(),
        }
    }
}

impl TokenSection {
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::BadRequest("token.issuer must not be empty".into()));
        }
        if !(1..=2_592_000).contains(&self.validity_secs) {
            return Err(AuthError::BadRequest(
                "token.validity_secs must be between 1 and 2592000".into(),
            ));
        }
        Ok(())
    }

    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_effect() -> Effect {
    Effect::Deny
}
fn default_true() -> bool {
    true
}
fn default_limit() -> u32 {
    100
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_max_keys() -> usize {
    DEFAULT_MAX_KEYS
}
fn default_issuer() -> String {
    "farmauth".into()
}
fn default_validity_secs() -> u64 {
    3600
}
