//! Authorization gateway: the single decision surface for business services.
//!
//! Composes the policy matrix, token validator, rate limiter and audit log.
//! Each component is owned here and handed in at construction; services get
//! a clone of the gateway (or an `Arc<dyn Authorizer>`), never a global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use farmauth_core::authorizer::Authorizer;
use farmauth_core::claims::AuthClaims;
use farmauth_core::context::RequestContext;
use farmauth_core::error::{AuthError, Result};
use farmauth_core::policy::{AccessRequest, Decision, Effect, MatchField};

use crate::audit::{AuditEventType, AuditLog, AuditRecord, AuditResult};
use crate::clock::{Clock, SystemClock};
use crate::config::schema::{FarmAuthConfig, PolicySection, CUSTOM_PRESET};
use crate::obs::GatewayMetrics;
use crate::policy::{compile_field, compile_grants, PolicyMatrix, PresetFactory, RoleTemplate};
use crate::ratelimit::RateLimiter;
use crate::token::TokenValidator;

/// Limiter key prefix for permission checks; the subject follows.
pub const CHECK_PERMISSION_KEY_PREFIX: &str = "check_permission:";

#[derive(Clone)]
pub struct AuthorizationGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    matrix: PolicyMatrix,
    tokens: TokenValidator,
    limiter: RateLimiter,
    audit: AuditLog,
    metrics: GatewayMetrics,
    security_enabled: AtomicBool,
}

impl AuthorizationGateway {
    pub fn new(
        matrix: PolicyMatrix,
        tokens: TokenValidator,
        limiter: RateLimiter,
        audit: AuditLog,
        security_enabled: bool,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                matrix,
                tokens,
                limiter,
                audit,
                metrics: GatewayMetrics::default(),
                security_enabled: AtomicBool::new(security_enabled),
            }),
        }
    }

    /// Build every component from a validated config.
    pub fn from_config(cfg: &FarmAuthConfig) -> Result<Self> {
        Self::from_config_with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(cfg: &FarmAuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        cfg.validate()?;

        let matrix = build_matrix(&cfg.policy)?;
        let tokens = TokenValidator::with_clock(
            cfg.token.issuer.clone(),
            cfg.token.validity(),
            Arc::clone(&clock),
        )?;

        let limiter =
            RateLimiter::with_clock(cfg.rate_limit.limit, cfg.rate_limit.window(), Arc::clone(&clock))
                .with_max_keys(cfg.rate_limit.max_keys);
        for (key, limit) in &cfg.rate_limit.overrides {
            limiter.set_limit(key, *limit);
        }

        let audit = AuditLog::with_clock(clock);
        if !cfg.audit.enabled {
            audit.disable();
        }

        tracing::info!(
            rules = matrix.len(),
            default_effect = %matrix.default_effect(),
            security = cfg.security.enabled,
            issuer = %cfg.token.issuer,
            "authorization gateway built"
        );

        Ok(Self::new(matrix, tokens, limiter, audit, cfg.security.enabled))
    }

    pub fn matrix(&self) -> &PolicyMatrix {
        &self.inner.matrix
    }

    pub fn tokens(&self) -> &TokenValidator {
        &self.inner.tokens
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    pub fn security_enabled(&self) -> bool {
        self.inner.security_enabled.load(Ordering::SeqCst)
    }

    /// Toggle rate limiting and auditing for every gateway call.
    pub fn set_security_enabled(&self, enabled: bool) {
        self.inner.security_enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "gateway security features toggled");
    }

    pub fn check_permission(
        &self,
        ctx: &RequestContext,
        subject: &str,
        resource: &str,
        action: &str,
        object: &str,
        org_id: &str,
    ) -> Result<bool> {
        self.check(ctx, &AccessRequest::new(subject, resource, action, object, org_id))
    }

    pub fn check(&self, ctx: &RequestContext, req: &AccessRequest<'_>) -> Result<bool> {
        self.decide(ctx, req).map(|d| d.allowed())
    }

    /// Throttle, evaluate and audit one request, keeping the deciding rule.
    pub fn decide(&self, ctx: &RequestContext, req: &AccessRequest<'_>) -> Result<Decision> {
        let started = Instant::now();

        if !self.security_enabled() {
            return Ok(self.inner.matrix.evaluate(req));
        }

        let key = format!("{CHECK_PERMISSION_KEY_PREFIX}{}", req.subject);
        if let Err(err) = self.inner.limiter.allow(&key) {
            let (event_type, result) = match &err {
                AuthError::RateLimitExceeded { .. } => {
                    self.inner.metrics.rate_limited.inc(&[("scope", "check_permission")]);
                    (AuditEventType::RateLimitExceeded, AuditResult::Denied)
                }
                _ => (AuditEventType::PermissionCheck, AuditResult::Error),
            };
            self.record(
                ctx,
                request_record(event_type, result, req).detail("error", err.to_string()),
            );
            tracing::warn!(subject = %req.subject, resource = %req.resource, action = %req.action, error = %err, "permission check refused");
            return Err(err);
        }

        let decision = self.inner.matrix.evaluate(req);
        let result = if decision.allowed() {
            AuditResult::Success
        } else {
            AuditResult::Denied
        };
        let matched = decision
            .matched
            .map_or_else(|| "default".to_string(), |seq| seq.to_string());

        self.record(
            ctx,
            request_record(AuditEventType::PermissionCheck, result, req)
                .detail("effect", decision.effect.as_str())
                .detail("matched_rule", matched),
        );
        self.inner.metrics.permission_checks.inc(&[(
            "result",
            if decision.allowed() { "allowed" } else { "denied" },
        )]);
        self.inner
            .metrics
            .check_duration
            .observe(&[], started.elapsed());

        tracing::debug!(
            subject = %req.subject,
            resource = %req.resource,
            action = %req.action,
            object = %req.object,
            org = %req.org_id,
            effect = %decision.effect,
            matched = ?decision.matched,
            "permission evaluated"
        );
        Ok(decision)
    }

    pub fn validate_token(&self, ctx: &RequestContext, token: &str) -> Result<AuthClaims> {
        match self.inner.tokens.validate_token(token) {
            Ok(claims) => {
                self.inner.metrics.token_validations.inc(&[("result", "success")]);
                if self.security_enabled() {
                    self.record(
                        ctx,
                        AuditRecord::new(AuditEventType::TokenValidationSuccess, AuditResult::Success)
                            .user(&claims.subject)
                            .org(&claims.org_id),
                    );
                }
                Ok(claims)
            }
            Err(err) => {
                self.inner.metrics.token_validations.inc(&[("result", "failed")]);
                let reason = err.token_reason().map_or("other", |r| r.as_str());
                tracing::warn!(reason, "token validation failed");

                if self.security_enabled() {
                    let mut rec =
                        AuditRecord::new(AuditEventType::TokenValidationFailed, AuditResult::Denied)
                            .detail("reason", reason);
                    if let Some((sub, org)) = self.inner.tokens.peek_identity(token) {
                        rec = rec.user(sub).org(org).detail("identity", "unverified");
                    }
                    self.record(ctx, rec);
                }
                Err(err)
            }
        }
    }

    pub fn generate_token<I, S>(
        &self,
        ctx: &RequestContext,
        subject: &str,
        org_id: &str,
        roles: I,
    ) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let res = self.inner.tokens.generate_token(subject, org_id, roles);
        if res.is_ok() {
            self.inner.metrics.tokens_issued.inc(&[]);
        }
        if self.security_enabled() {
            let rec = match &res {
                Ok(_) => AuditRecord::new(AuditEventType::TokenIssued, AuditResult::Success),
                Err(e) => AuditRecord::new(AuditEventType::TokenIssued, AuditResult::Error)
                    .detail("error", e.to_string()),
            };
            self.record(ctx, rec.user(subject).org(org_id));
        }
        res
    }

    pub fn add_allow_rule(
        &self,
        ctx: &RequestContext,
        subject: impl Into<MatchField>,
        resource: impl Into<MatchField>,
        action: impl Into<MatchField>,
        object: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) -> u64 {
        self.add_rule(
            ctx,
            Effect::Allow,
            subject.into(),
            resource.into(),
            action.into(),
            object.into(),
            org_id.into(),
        )
    }

    pub fn add_deny_rule(
        &self,
        ctx: &RequestContext,
        subject: impl Into<MatchField>,
        resource: impl Into<MatchField>,
        action: impl Into<MatchField>,
        object: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) -> u64 {
        self.add_rule(
            ctx,
            Effect::Deny,
            subject.into(),
            resource.into(),
            action.into(),
            object.into(),
            org_id.into(),
        )
    }

    pub fn clear_policy(&self, ctx: &RequestContext) {
        let dropped = self.inner.matrix.len();
        self.inner.matrix.clear();
        if self.security_enabled() {
            self.record(
                ctx,
                AuditRecord::new(AuditEventType::PolicyCleared, AuditResult::Success)
                    .detail("dropped", dropped.to_string()),
            );
        }
    }

    /// Prometheus text for counters plus rule/audit gauges.
    pub fn render_metrics(&self) -> String {
        let rules = u64::try_from(self.inner.matrix.len()).unwrap_or(u64::MAX);
        let events = u64::try_from(self.inner.audit.len()).unwrap_or(u64::MAX);
        self.inner.metrics.render(&[
            ("farmauth_policy_rules", rules),
            ("farmauth_audit_events", events),
        ])
    }

    #[allow(clippy::too_many_arguments)]
    fn add_rule(
        &self,
        ctx: &RequestContext,
        effect: Effect,
        subject: MatchField,
        resource: MatchField,
        action: MatchField,
        object: MatchField,
        org_id: MatchField,
    ) -> u64 {
        let rec = AuditRecord::new(AuditEventType::PolicyRuleAdded, AuditResult::Success)
            .user(subject.pattern())
            .org(org_id.pattern())
            .resource(resource.pattern())
            .action(action.pattern())
            .detail("effect", effect.as_str())
            .detail("object", object.pattern());

        let seq = self
            .inner
            .matrix
            .add_rule(effect, subject, resource, action, object, org_id);

        if self.security_enabled() {
            self.record(ctx, rec.detail("sequence", seq.to_string()));
        }
        seq
    }

    fn record(&self, ctx: &RequestContext, rec: AuditRecord) {
        let rec = match ctx.request_id() {
            Some(id) => rec.detail("request_id", id),
            None => rec,
        };
        self.inner.audit.log_event(rec);
    }
}

impl Authorizer for AuthorizationGateway {
    fn check_permission(&self, ctx: &RequestContext, req: &AccessRequest<'_>) -> Result<bool> {
        self.check(ctx, req)
    }

    fn validate_token(&self, ctx: &RequestContext, token: &str) -> Result<AuthClaims> {
        AuthorizationGateway::validate_token(self, ctx, token)
    }
}

impl std::fmt::Debug for AuthorizationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGateway")
            .field("rules", &self.inner.matrix.len())
            .field("security_enabled", &self.security_enabled())
            .field("tokens", &self.inner.tokens)
            .field("limiter", &self.inner.limiter)
            .field("audit", &self.inner.audit)
            .finish()
    }
}

fn request_record(
    event_type: AuditEventType,
    result: AuditResult,
    req: &AccessRequest<'_>,
) -> AuditRecord {
    let rec = AuditRecord::new(event_type, result)
        .user(req.subject)
        .org(req.org_id)
        .resource(req.resource)
        .action(req.action);
    if req.object.is_empty() {
        rec
    } else {
        rec.detail("object", req.object)
    }
}

/// Compile the policy section: explicit rules first, then grants.
pub fn build_matrix(policy: &PolicySection) -> Result<PolicyMatrix> {
    let matrix = PolicyMatrix::new(policy.default_effect);

    for r in &policy.rules {
        matrix.add_rule(
            r.effect,
            compile_field("subject", &r.subject)?,
            compile_field("resource", &r.resource)?,
            compile_field("action", &r.action)?,
            compile_field("object", &r.object)?,
            compile_field("org", &r.org)?,
        );
    }

    for g in &policy.grants {
        if g.preset == CUSTOM_PRESET {
            let subject = compile_field("subject", &g.subject)?;
            let org = compile_field("org", &g.org)?;
            for grant in compile_grants(&g.allow)? {
                matrix.add_rule(
                    Effect::Allow,
                    subject.clone(),
                    grant.resource,
                    grant.action,
                    MatchField::Any,
                    org.clone(),
                );
            }
            continue;
        }
        let template = RoleTemplate::from_name(&g.preset)
            .ok_or_else(|| AuthError::BadRequest(format!("unknown preset: {}", g.preset)))?;
        PresetFactory::apply(
            &matrix,
            template,
            compile_field("subject", &g.subject)?,
            compile_field("org", &g.org)?,
        );
    }

    Ok(matrix)
}
