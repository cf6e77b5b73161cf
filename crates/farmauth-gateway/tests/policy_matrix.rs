#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use farmauth_core::{AccessRequest, Effect, MatchField};
use farmauth_gateway::policy::{PolicyMatrix, PresetFactory, RoleTemplate};

const ANY: MatchField = MatchField::Any;

struct Exploding;

impl From<Exploding> for MatchField {
    fn from(_: Exploding) -> Self {
        panic!("field conversion failed")
    }
}

#[test]
fn empty_deny_matrix_denies() {
    let m = PolicyMatrix::deny_by_default();
    assert!(!m.check_permission("u1", "farm", "read", "f1", "org1"));
}

#[test]
fn empty_allow_matrix_allows() {
    let m = PolicyMatrix::allow_by_default();
    assert!(m.check_permission("u1", "farm", "read", "f1", "org1"));
    assert!(m.check_permission("", "", "", "", ""));
}

#[test]
fn allow_rule_is_scoped_to_org() {
    let m = PolicyMatrix::deny_by_default();
    m.add_allow_rule("u1", "farm", "read", ANY, "org1");

    assert!(m.check_permission("u1", "farm", "read", "f1", "org1"));
    assert!(!m.check_permission("u1", "farm", "read", "f1", "org2"));
}

#[test]
fn earlier_deny_beats_identical_allow() {
    let m = PolicyMatrix::deny_by_default();
    m.add_deny_rule("u1", "farm", "delete", ANY, "org1");
    m.add_allow_rule("u1", "farm", "delete", ANY, "org1");

    assert!(!m.check_permission("u1", "farm", "delete", "f1", "org1"));
}

#[test]
fn first_match_wins_even_when_later_rule_is_narrower() {
    let m = PolicyMatrix::allow_by_default();
    m.add_deny_rule(ANY, "farm", ANY, ANY, "org1");
    m.add_allow_rule("u1", "farm", "read", "f1", "org1");

    let d = m.evaluate(&AccessRequest::new("u1", "farm", "read", "f1", "org1"));
    assert_eq!(d.effect, Effect::Deny);
    assert_eq!(d.matched, Some(1));
}

#[test]
fn exception_before_grant_carves_out() {
    let m = PolicyMatrix::deny_by_default();
    m.add_deny_rule("u1", "farm", "delete", "f9", "org1");
    m.add_allow_rule("u1", "farm", ANY, ANY, "org1");

    assert!(!m.check_permission("u1", "farm", "delete", "f9", "org1"));
    assert!(m.check_permission("u1", "farm", "delete", "f1", "org1"));
}

#[test]
fn wildcard_matches_any_literal_in_each_position() {
    let values = ["a", "farm", "f-1", "org 2", "x:y"];

    let cases: [(MatchField, MatchField, MatchField, MatchField, MatchField); 5] = [
        (ANY, "r".into(), "a".into(), "o".into(), "g".into()),
        ("s".into(), ANY, "a".into(), "o".into(), "g".into()),
        ("s".into(), "r".into(), ANY, "o".into(), "g".into()),
        ("s".into(), "r".into(), "a".into(), ANY, "g".into()),
        ("s".into(), "r".into(), "a".into(), "o".into(), ANY),
    ];

    for (pos, (s, r, a, o, g)) in cases.into_iter().enumerate() {
        let m = PolicyMatrix::deny_by_default();
        m.add_allow_rule(s, r, a, o, g);
        for v in values {
            let mut q = ["s", "r", "a", "o", "g"];
            q[pos] = v;
            assert!(
                m.check_permission(q[0], q[1], q[2], q[3], q[4]),
                "wildcard at {pos} should match {v:?}"
            );
        }
        // A literal position still filters.
        let other = (pos + 1) % 5;
        let mut q = ["s", "r", "a", "o", "g"];
        q[other] = "nope";
        assert!(!m.check_permission(q[0], q[1], q[2], q[3], q[4]));
    }
}

#[test]
fn literal_star_subject_is_not_a_wildcard() {
    let m = PolicyMatrix::deny_by_default();
    m.add_allow_rule("*", "farm", "read", ANY, "org1");

    assert!(!m.check_permission("u1", "farm", "read", "f1", "org1"));
    assert!(m.check_permission("*", "farm", "read", "f1", "org1"));
}

#[test]
fn empty_object_query_needs_wildcard_object_rule() {
    let m = PolicyMatrix::deny_by_default();
    m.add_allow_rule("u1", "farm", "list", "f1", "org1");
    assert!(!m.check_permission("u1", "farm", "list", "", "org1"));

    m.add_allow_rule("u1", "farm", "list", "", "org1");
    assert!(m.rules()[1].object.is_any());
    assert!(m.check_permission("u1", "farm", "list", "", "org1"));
    assert!(m.check_permission("u1", "farm", "list", "f2", "org1"));
}

#[test]
fn malformed_input_resolves_to_default() {
    let deny = PolicyMatrix::deny_by_default();
    deny.add_allow_rule("u1", "farm", "read", ANY, "org1");
    assert!(!deny.check_permission("", "", "", "", ""));

    let allow = PolicyMatrix::allow_by_default();
    allow.add_deny_rule("u1", "farm", "read", ANY, "org1");
    assert!(allow.check_permission("", "farm", "read", "f1", "org1"));
}

#[test]
fn clear_restores_fresh_behavior() {
    let m = PolicyMatrix::deny_by_default();
    m.add_allow_rule(ANY, ANY, ANY, ANY, ANY);
    assert!(m.check_permission("u1", "farm", "read", "f1", "org1"));

    m.clear();
    assert!(m.is_empty());
    assert_eq!(m.default_effect(), Effect::Deny);
    assert!(!m.check_permission("u1", "farm", "read", "f1", "org1"));

    m.clear();
    assert!(m.is_empty());
}

#[test]
fn sequences_keep_growing_across_clear() {
    let m = PolicyMatrix::deny_by_default();
    assert_eq!(m.add_rule(Effect::Allow, "a", "b", "c", ANY, "d"), 1);
    assert_eq!(m.add_rule(Effect::Deny, "a", "b", "c", ANY, "d"), 2);
    m.clear();
    assert_eq!(m.add_rule(Effect::Allow, "a", "b", "c", ANY, "d"), 3);
    assert_eq!(m.rule(3).map(|r| r.effect), Some(Effect::Allow));
    assert!(m.rule(1).is_none());
}

#[test]
fn panicking_field_conversion_leaves_matrix_usable() {
    let m = PolicyMatrix::allow_by_default();
    m.add_deny_rule("u1", "farm", "delete", ANY, "org1");

    let res = catch_unwind(AssertUnwindSafe(|| {
        m.add_allow_rule(Exploding, "farm", "read", ANY, "org1");
    }));
    assert!(res.is_err());

    assert_eq!(m.len(), 1);
    assert!(m.check_permission("u2", "farm", "read", "f1", "org1"));
    assert!(!m.check_permission("u1", "farm", "delete", "f1", "org1"));
    assert_eq!(m.add_rule(Effect::Allow, "u1", "farm", "read", ANY, "org1"), 2);
}

#[test]
fn rules_snapshot_is_a_copy() {
    let m = PolicyMatrix::deny_by_default();
    m.add_allow_rule("u1", "farm", "read", ANY, "org1");

    let mut snap = m.rules();
    snap.clear();
    assert_eq!(m.len(), 1);
}

#[test]
fn concurrent_appends_keep_insertion_order() {
    let m = PolicyMatrix::deny_by_default();

    thread::scope(|s| {
        for w in 0..4 {
            let m = &m;
            s.spawn(move || {
                for i in 0..50 {
                    m.add_allow_rule(format!("w{w}"), "farm", format!("a{i}"), ANY, "org1");
                }
            });
        }
        for _ in 0..4 {
            let m = &m;
            s.spawn(move || {
                for _ in 0..200 {
                    let _ = m.check_permission("w0", "farm", "a0", "f1", "org1");
                }
            });
        }
    });

    let rules = m.rules();
    assert_eq!(rules.len(), 200);
    for (i, r) in rules.iter().enumerate() {
        assert_eq!(r.sequence, i as u64 + 1);
    }
    // Each writer's rules appear in the order it appended them.
    for w in 0..4 {
        let subject = MatchField::from(format!("w{w}"));
        let actions: Vec<String> = rules
            .iter()
            .filter(|r| r.subject == subject)
            .map(|r| r.action.pattern().to_string())
            .collect();
        let expected: Vec<String> = (0..50).map(|i| format!("a{i}")).collect();
        assert_eq!(actions, expected);
    }
}

#[test]
fn admin_preset_is_org_bound() {
    let m = PresetFactory::matrix(Effect::Deny, &[(RoleTemplate::Admin, "boss", "org1")]);

    assert!(m.check_permission("boss", "fpo", "delete", "fpo-7", "org1"));
    assert!(!m.check_permission("boss", "fpo", "delete", "fpo-7", "org2"));
    assert!(!m.check_permission("other", "fpo", "read", "fpo-7", "org1"));
}

#[test]
fn read_only_preset_allows_read_and_list_only() {
    let m = PresetFactory::matrix(Effect::Deny, &[(RoleTemplate::ReadOnly, "auditor", "org1")]);

    assert!(m.check_permission("auditor", "farm", "read", "f1", "org1"));
    assert!(m.check_permission("auditor", "crop_cycle", "list", "", "org1"));
    assert!(!m.check_permission("auditor", "farm", "update", "f1", "org1"));
    assert!(!m.check_permission("auditor", "farm", "delete", "f1", "org1"));
}

#[test]
fn operational_presets_follow_their_grants() {
    let m = PresetFactory::matrix(
        Effect::Deny,
        &[
            (RoleTemplate::FieldAgent, "agent", "org1"),
            (RoleTemplate::FpoManager, "mgr", "org1"),
        ],
    );

    assert!(m.check_permission("agent", "farmer", "create", "", "org1"));
    assert!(!m.check_permission("agent", "farm", "delete", "f1", "org1"));
    assert!(m.check_permission("mgr", "fpo", "add_member", "fpo-1", "org1"));
    assert!(!m.check_permission("mgr", "farm", "create", "", "org1"));
}

#[test]
fn deny_exception_before_preset_wins() {
    let m = PolicyMatrix::deny_by_default();
    m.add_deny_rule("boss", "fpo", "delete", ANY, "org1");
    PresetFactory::apply(&m, RoleTemplate::Admin, "boss", "org1");

    assert!(!m.check_permission("boss", "fpo", "delete", "fpo-1", "org1"));
    assert!(m.check_permission("boss", "fpo", "update", "fpo-1", "org1"));
}

#[test]
fn custom_operational_grants() {
    let m = PolicyMatrix::deny_by_default();
    PresetFactory::operational(&m, "sync-bot", "org1", &[("activity", "create"), ("activity", "read")]);

    assert_eq!(m.len(), 2);
    assert!(m.check_permission("sync-bot", "activity", "create", "act-1", "org1"));
    assert!(!m.check_permission("sync-bot", "activity", "delete", "act-1", "org1"));
}

#[test]
fn template_names_round_trip() {
    for t in RoleTemplate::ALL {
        assert_eq!(RoleTemplate::from_name(t.name()), Some(t));
    }
    assert_eq!(RoleTemplate::from_name("superuser"), None);
}
