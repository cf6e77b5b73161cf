use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    PermissionCheck,
    RateLimitExceeded,
    TokenValidationSuccess,
    TokenValidationFailed,
    TokenIssued,
    PolicyRuleAdded,
    PolicyCleared,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventType::PermissionCheck => "permission_check",
            AuditEventType::RateLimitExceeded => "rate_limit_exceeded",
            AuditEventType::TokenValidationSuccess => "token_validation_success",
            AuditEventType::TokenValidationFailed => "token_validation_failed",
            AuditEventType::TokenIssued => "token_issued",
            AuditEventType::PolicyRuleAdded => "policy_rule_added",
            AuditEventType::PolicyCleared => "policy_cleared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Denied,
    Error,
}

impl AuditResult {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditResult::Success => "success",
            AuditResult::Denied => "denied",
            AuditResult::Error => "error",
        }
    }
}

/// What a caller hands to [`AuditLog::log_event`]. Carries no timestamp;
/// the log stamps it on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub event_type: AuditEventType,
    pub user_id: String,
    pub org_id: String,
    pub resource: String,
    pub action: String,
    pub result: AuditResult,
    pub details: BTreeMap<String, String>,
}

impl AuditRecord {
    pub fn new(event_type: AuditEventType, result: AuditResult) -> Self {
        Self {
            event_type,
            user_id: String::new(),
            org_id: String::new(),
            resource: String::new(),
            action: String::new(),
            result,
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub user_id: String,
    pub org_id: String,
    pub resource: String,
    pub action: String,
    pub result: AuditResult,
    pub details: BTreeMap<String, String>,
}

/// Append-only in-memory audit trail.
///
/// Every read returns a copy; nothing outside holds a reference into the
/// stored events.
pub struct AuditLog {
    enabled: AtomicBool,
    events: Mutex<Vec<AuditEvent>>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
            clock,
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Append `record`, stamped with the log's clock. No-op when disabled.
    pub fn log_event(&self, record: AuditRecord) {
        if !self.is_enabled() {
            return;
        }
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        // Stamp under the lock so trail order and timestamps agree.
        let timestamp = self.clock.now();
        events.push(AuditEvent {
            timestamp,
            event_type: record.event_type,
            user_id: record.user_id,
            org_id: record.org_id,
            resource: record.resource,
            action: record.action,
            result: record.result,
            details: record.details,
        });
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_by_user(&self, user_id: &str) -> Vec<AuditEvent> {
        self.filtered(|e| e.user_id == user_id)
    }

    pub fn events_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.filtered(|e| e.event_type == event_type)
    }

    pub fn events_by_org(&self, org_id: &str) -> Vec<AuditEvent> {
        self.filtered(|e| e.org_id == org_id)
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// One JSON object per line, oldest first.
    pub fn export_json_lines(&self) -> serde_json::Result<String> {
        let events = self.events();
        let mut out = String::new();
        for e in &events {
            let line = serde_json::to_string(e)?;
            let _ = writeln!(out, "{line}");
        }
        Ok(out)
    }

    fn filtered(&self, pred: impl Fn(&AuditEvent) -> bool) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .cloned()
            .collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("enabled", &self.is_enabled())
            .field("events", &self.len())
            .finish_non_exhaustive()
    }
}
