//! Policy data model shared by the matrix and its consumers.
//!
//! A rule is five match fields plus an effect. Match fields are a tagged
//! variant so that a literal `"*"` subject is never confused with "any".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a rule (or of the matrix default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn is_allow(self) -> bool {
        matches!(self, Effect::Allow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One position of a rule pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchField {
    /// Matches exactly this value.
    Literal(String),
    /// Matches any value.
    Any,
}

impl MatchField {
    pub fn literal(value: impl Into<String>) -> Self {
        MatchField::Literal(value.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, MatchField::Any)
    }

    /// Text form for logs and audit records: the literal, or `*`.
    pub fn pattern(&self) -> &str {
        match self {
            MatchField::Any => "*",
            MatchField::Literal(v) => v,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            MatchField::Any => true,
            MatchField::Literal(v) => v == value,
        }
    }

    /// Empty object patterns mean "every object".
    pub(crate) fn normalize_object(self) -> Self {
        match self {
            MatchField::Literal(v) if v.is_empty() => MatchField::Any,
            other => other,
        }
    }
}

impl From<&str> for MatchField {
    fn from(v: &str) -> Self {
        MatchField::Literal(v.to_string())
    }
}

impl From<String> for MatchField {
    fn from(v: String) -> Self {
        MatchField::Literal(v)
    }
}

impl From<&String> for MatchField {
    fn from(v: &String) -> Self {
        MatchField::Literal(v.clone())
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchField::Any => f.write_str("*"),
            MatchField::Literal(v) => write!(f, "{v:?}"),
        }
    }
}

/// A stored rule. Immutable once appended to a matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub subject: MatchField,
    pub resource: MatchField,
    pub action: MatchField,
    pub object: MatchField,
    pub org_id: MatchField,
    pub effect: Effect,
    /// Insertion order; lower wins.
    pub sequence: u64,
}

impl PolicyRule {
    pub fn new(
        effect: Effect,
        sequence: u64,
        subject: MatchField,
        resource: MatchField,
        action: MatchField,
        object: MatchField,
        org_id: MatchField,
    ) -> Self {
        Self {
            subject,
            resource,
            action,
            object: object.normalize_object(),
            org_id,
            effect,
            sequence,
        }
    }

    /// True when all five fields match the request.
    pub fn matches(&self, req: &AccessRequest<'_>) -> bool {
        let object_ok = if req.object.is_empty() {
            self.object.is_any()
        } else {
            self.object.matches(req.object)
        };

        object_ok
            && self.subject.matches(req.subject)
            && self.resource.matches(req.resource)
            && self.action.matches(req.action)
            && self.org_id.matches(req.org_id)
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} subject={} resource={} action={} object={} org={}",
            self.sequence,
            self.effect,
            self.subject,
            self.resource,
            self.action,
            self.object,
            self.org_id
        )
    }
}

/// A permission query. Borrowed so the hot path never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest<'a> {
    pub subject: &'a str,
    pub resource: &'a str,
    pub action: &'a str,
    /// Empty means "no specific object".
    pub object: &'a str,
    pub org_id: &'a str,
}

impl<'a> AccessRequest<'a> {
    pub fn new(
        subject: &'a str,
        resource: &'a str,
        action: &'a str,
        object: &'a str,
        org_id: &'a str,
    ) -> Self {
        Self {
            subject,
            resource,
            action,
            object,
            org_id,
        }
    }
}

/// Evaluation result with provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub effect: Effect,
    /// Sequence of the deciding rule; `None` when the default applied.
    pub matched: Option<u64>,
}

impl Decision {
    pub fn allowed(&self) -> bool {
        self.effect.is_allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(object: MatchField) -> PolicyRule {
        PolicyRule::new(
            Effect::Allow,
            1,
            "u1".into(),
            "farm".into(),
            "read".into(),
            object,
            "org1".into(),
        )
    }

    #[test]
    fn empty_stored_object_becomes_any() {
        assert!(rule("".into()).object.is_any());
    }

    #[test]
    fn empty_query_object_only_hits_wildcard_object() {
        let req = AccessRequest::new("u1", "farm", "read", "", "org1");
        assert!(rule(MatchField::Any).matches(&req));
        assert!(!rule("f1".into()).matches(&req));
    }

    #[test]
    fn literal_star_is_not_a_wildcard() {
        let r = PolicyRule::new(
            Effect::Allow,
            1,
            "*".into(),
            "farm".into(),
            "read".into(),
            MatchField::Any,
            "org1".into(),
        );
        assert!(!r.matches(&AccessRequest::new("u1", "farm", "read", "f1", "org1")));
        assert!(r.matches(&AccessRequest::new("*", "farm", "read", "f1", "org1")));
    }
}
