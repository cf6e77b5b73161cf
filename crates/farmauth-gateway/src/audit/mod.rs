//! Audit trail for security-relevant decisions.

pub mod log;

pub use log::{AuditEvent, AuditEventType, AuditLog, AuditRecord, AuditResult};
