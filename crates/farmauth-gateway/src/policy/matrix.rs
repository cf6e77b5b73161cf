use std::sync::{PoisonError, RwLock};

use farmauth_core::policy::{AccessRequest, Decision, Effect, MatchField, PolicyRule};

/// Ordered, first-match-wins rule store.
///
/// Rules are evaluated in insertion order and the first rule whose five
/// fields all match decides. When nothing matches, the default effect fixed
/// at construction applies. A broad deny added early shadows any later
/// allow, so exceptions must be added before grants.
///
/// Evaluations share the read lock and always see a whole rule list;
/// appends and clears take the write lock.
#[derive(Debug)]
pub struct PolicyMatrix {
    default_effect: Effect,
    inner: RwLock<RuleSet>,
}

#[derive(Debug, Default)]
struct RuleSet {
    rules: Vec<PolicyRule>,
    next_seq: u64,
}

impl PolicyMatrix {
    pub fn new(default_effect: Effect) -> Self {
        Self {
            default_effect,
            inner: RwLock::new(RuleSet {
                rules: Vec::new(),
                next_seq: 1,
            }),
        }
    }

    pub fn deny_by_default() -> Self {
        Self::new(Effect::Deny)
    }

    pub fn allow_by_default() -> Self {
        Self::new(Effect::Allow)
    }

    pub fn default_effect(&self) -> Effect {
        self.default_effect
    }

    /// Append a rule and return its sequence number.
    pub fn add_rule(
        &self,
        effect: Effect,
        subject: impl Into<MatchField>,
        resource: impl Into<MatchField>,
        action: impl Into<MatchField>,
        object: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) -> u64 {
        // Caller conversions run before the lock is taken.
        let mut rule = PolicyRule::new(
            effect,
            0,
            subject.into(),
            resource.into(),
            action.into(),
            object.into(),
            org_id.into(),
        );

        let mut set = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let seq = set.next_seq;
        set.next_seq += 1;
        rule.sequence = seq;
        tracing::debug!(rule = %rule, "policy rule appended");
        set.rules.push(rule);
        seq
    }

    pub fn add_allow_rule(
        &self,
        subject: impl Into<MatchField>,
        resource: impl Into<MatchField>,
        action: impl Into<MatchField>,
        object: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) {
        self.add_rule(Effect::Allow, subject, resource, action, object, org_id);
    }

    pub fn add_deny_rule(
        &self,
        subject: impl Into<MatchField>,
        resource: impl Into<MatchField>,
        action: impl Into<MatchField>,
        object: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) {
        self.add_rule(Effect::Deny, subject, resource, action, object, org_id);
    }

    /// Drop every rule. The default effect is kept; sequence numbers are
    /// never reused.
    pub fn clear(&self) {
        let mut set = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = set.rules.len();
        set.rules.clear();
        tracing::info!(dropped, "policy rules cleared");
    }

    /// Evaluate and report which rule decided.
    pub fn evaluate(&self, req: &AccessRequest<'_>) -> Decision {
        let set = match self.inner.read() {
            Ok(g) => g,
            Err(_) => {
                // Poisoned lock means a writer panicked; fail closed.
                tracing::error!("policy matrix lock poisoned; denying");
                return Decision {
                    effect: Effect::Deny,
                    matched: None,
                };
            }
        };

        match set.rules.iter().find(|r| r.matches(req)) {
            Some(rule) => Decision {
                effect: rule.effect,
                matched: Some(rule.sequence),
            },
            None => Decision {
                effect: self.default_effect,
                matched: None,
            },
        }
    }

    pub fn check_permission(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
        object: &str,
        org_id: &str,
    ) -> bool {
        self.evaluate(&AccessRequest::new(subject, resource, action, object, org_id))
            .allowed()
    }

    /// Ordered copy of the current rules.
    pub fn rules(&self) -> Vec<PolicyRule> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .clone()
    }

    pub fn rule(&self, sequence: u64) -> Option<PolicyRule> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .iter()
            .find(|r| r.sequence == sequence)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PolicyMatrix {
    fn default() -> Self {
        Self::deny_by_default()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

    use super::*;

    #[test]
    fn poisoned_lock_denies_even_with_allow_default() {
        let m = PolicyMatrix::allow_by_default();
        m.add_allow_rule("u1", "farm", "read", MatchField::Any, "org1");

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _held = m.inner.write();
            resume_unwind(Box::new("writer died"));
        }));
        assert!(m.inner.is_poisoned());

        assert!(!m.check_permission("u1", "farm", "read", "f1", "org1"));
        let d = m.evaluate(&AccessRequest::new("anyone", "fpo", "list", "", "org9"));
        assert_eq!(d.effect, Effect::Deny);
        assert_eq!(d.matched, None);
    }
}
