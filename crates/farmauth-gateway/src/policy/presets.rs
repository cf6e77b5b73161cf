//! Role templates for common farm-management personas.
//!
//! A preset is only a batch of ordinary allow rules appended to a matrix; it
//! has no evaluation path of its own. Deny exceptions meant to override a
//! preset must be appended before it.

use farmauth_core::policy::{Effect, MatchField};

use super::matrix::PolicyMatrix;

pub const RESOURCE_FARMER: &str = "farmer";
pub const RESOURCE_FARM: &str = "farm";
pub const RESOURCE_CROP_CYCLE: &str = "crop_cycle";
pub const RESOURCE_ACTIVITY: &str = "activity";
pub const RESOURCE_FPO: &str = "fpo";

const READ_ONLY_ACTIONS: [&str; 2] = ["read", "list"];

const FARMER_GRANTS: &[(&str, &str)] = &[
    (RESOURCE_FARMER, "read"),
    (RESOURCE_FARMER, "update"),
    (RESOURCE_FARM, "read"),
    (RESOURCE_FARM, "list"),
    (RESOURCE_FARM, "create"),
    (RESOURCE_FARM, "update"),
    (RESOURCE_CROP_CYCLE, "read"),
    (RESOURCE_CROP_CYCLE, "list"),
    (RESOURCE_CROP_CYCLE, "create"),
    (RESOURCE_CROP_CYCLE, "update"),
    (RESOURCE_ACTIVITY, "read"),
    (RESOURCE_ACTIVITY, "list"),
    (RESOURCE_ACTIVITY, "create"),
    (RESOURCE_ACTIVITY, "update"),
];

const FIELD_AGENT_GRANTS: &[(&str, &str)] = &[
    (RESOURCE_FARMER, "read"),
    (RESOURCE_FARMER, "list"),
    (RESOURCE_FARMER, "create"),
    (RESOURCE_FARM, "read"),
    (RESOURCE_FARM, "list"),
    (RESOURCE_FARM, "create"),
    (RESOURCE_CROP_CYCLE, "read"),
    (RESOURCE_CROP_CYCLE, "list"),
    (RESOURCE_ACTIVITY, "read"),
    (RESOURCE_ACTIVITY, "list"),
    (RESOURCE_ACTIVITY, "create"),
];

const FPO_MANAGER_GRANTS: &[(&str, &str)] = &[
    (RESOURCE_FPO, "read"),
    (RESOURCE_FPO, "update"),
    (RESOURCE_FPO, "add_member"),
    (RESOURCE_FPO, "remove_member"),
    (RESOURCE_FARMER, "read"),
    (RESOURCE_FARMER, "list"),
    (RESOURCE_FARM, "read"),
    (RESOURCE_FARM, "list"),
    (RESOURCE_CROP_CYCLE, "read"),
    (RESOURCE_CROP_CYCLE, "list"),
    (RESOURCE_ACTIVITY, "read"),
    (RESOURCE_ACTIVITY, "list"),
];

/// Named role template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTemplate {
    /// Everything within one org.
    Admin,
    /// `read` and `list` on every resource within one org.
    ReadOnly,
    Farmer,
    FieldAgent,
    FpoManager,
}

impl RoleTemplate {
    pub const ALL: [RoleTemplate; 5] = [
        RoleTemplate::Admin,
        RoleTemplate::ReadOnly,
        RoleTemplate::Farmer,
        RoleTemplate::FieldAgent,
        RoleTemplate::FpoManager,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RoleTemplate::Admin => "admin",
            RoleTemplate::ReadOnly => "read_only",
            RoleTemplate::Farmer => "farmer",
            RoleTemplate::FieldAgent => "field_agent",
            RoleTemplate::FpoManager => "fpo_manager",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Resource/action pairs for the operational roles; empty for the
    /// wildcard-based ones.
    pub fn grants(self) -> &'static [(&'static str, &'static str)] {
        match self {
            RoleTemplate::Farmer => FARMER_GRANTS,
            RoleTemplate::FieldAgent => FIELD_AGENT_GRANTS,
            RoleTemplate::FpoManager => FPO_MANAGER_GRANTS,
            RoleTemplate::Admin | RoleTemplate::ReadOnly => &[],
        }
    }
}

/// Seeds matrices with role templates.
pub struct PresetFactory;

impl PresetFactory {
    /// Fresh matrix with one template applied per `(template, subject, org)`.
    pub fn matrix(
        default_effect: Effect,
        assignments: &[(RoleTemplate, &str, &str)],
    ) -> PolicyMatrix {
        let matrix = PolicyMatrix::new(default_effect);
        for (template, subject, org_id) in assignments {
            Self::apply(&matrix, *template, *subject, *org_id);
        }
        matrix
    }

    pub fn apply(
        matrix: &PolicyMatrix,
        template: RoleTemplate,
        subject: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) {
        let subject = subject.into();
        let org_id = org_id.into();
        tracing::info!(
            role = template.name(),
            subject = subject.pattern(),
            org = org_id.pattern(),
            "role preset applied"
        );
        match template {
            RoleTemplate::Admin => Self::admin(matrix, subject, org_id),
            RoleTemplate::ReadOnly => Self::read_only(matrix, subject, org_id),
            other => Self::operational(matrix, subject, org_id, other.grants()),
        }
    }

    pub fn admin(matrix: &PolicyMatrix, subject: impl Into<MatchField>, org_id: impl Into<MatchField>) {
        matrix.add_allow_rule(subject, MatchField::Any, MatchField::Any, MatchField::Any, org_id);
    }

    pub fn read_only(
        matrix: &PolicyMatrix,
        subject: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
    ) {
        let subject = subject.into();
        let org_id = org_id.into();
        for action in READ_ONLY_ACTIONS {
            matrix.add_allow_rule(subject.clone(), MatchField::Any, action, MatchField::Any, org_id.clone());
        }
    }

    /// Allow exactly the listed `(resource, action)` pairs on any object.
    pub fn operational<R, A>(
        matrix: &PolicyMatrix,
        subject: impl Into<MatchField>,
        org_id: impl Into<MatchField>,
        grants: &[(R, A)],
    ) where
        R: AsRef<str>,
        A: AsRef<str>,
    {
        let subject = subject.into();
        let org_id = org_id.into();
        for (resource, action) in grants {
            matrix.add_allow_rule(
                subject.clone(),
                resource.as_ref(),
                action.as_ref(),
                MatchField::Any,
                org_id.clone(),
            );
        }
    }
}
