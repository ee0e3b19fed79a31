use dyncohort_core::{Combinator, ConditionConfig, ConditionRecord, RecordingEventSink, RuleDraft};
use dyncohort_engine::{save_rule, toggle_rule_enabled, Engine, ManualClock, Settings};
use dyncohort_store::db::open_in_memory_migrated;
use dyncohort_store::CohortRepo;

#[allow(dead_code)]
pub const NOW: i64 = 1_700_000_000;

/// Target cohort used by most tests
#[allow(dead_code)]
pub const TARGET: i64 = 20;

/// Users 1-4 are live, user 5 is deleted
///
/// - ann (1): manual, logged in yesterday, completed course 2
/// - bob (2): ldap, never logged in, member of cohort 21
/// - cat (3): manual, logged in 30 days ago, completed course 2
/// - dan (4): ldap, logged in an hour ago
const SEED: &str = "
INSERT INTO users (id, username, auth, deleted, timecreated, lastaccess) VALUES
    (1, 'ann', 'manual', 0, 1000, 1699913600),
    (2, 'bob', 'ldap',   0, 2000, 0),
    (3, 'cat', 'manual', 0, 3000, 1697408000),
    (4, 'dan', 'ldap',   0, 4000, 1699996400),
    (5, 'eve', 'manual', 1, 5000, 1699999000);

INSERT INTO auth_plugins (name, enabled) VALUES ('manual', 1), ('ldap', 1);

INSERT INTO course_categories (id, name) VALUES (1, 'Science');
INSERT INTO course (id, fullname, category, enablecompletion) VALUES (2, 'Chemistry 101', 1, 1);
INSERT INTO course_completions (userid, course, timecompleted) VALUES
    (1, 2, 1600000000),
    (3, 2, 1650000000),
    (5, 2, 1600000000);

INSERT INTO cohort (id, name) VALUES (20, 'Target'), (21, 'Staff'), (22, 'Other');
INSERT INTO cohort_members (cohortid, userid) VALUES (21, 2);
";

#[allow(dead_code)]
pub struct Fixture {
    pub engine: Engine,
    pub events: RecordingEventSink,
    pub clock: ManualClock,
}

#[allow(dead_code)]
pub fn setup() -> Fixture {
    setup_with(Settings::default())
}

#[allow(dead_code)]
pub fn setup_with(settings: Settings) -> Fixture {
    let conn = open_in_memory_migrated().unwrap();
    conn.execute_batch(SEED).unwrap();
    let clock = ManualClock::new(NOW);
    let mut engine = Engine::new(conn, settings).with_clock(clock.clone());
    let events = RecordingEventSink::new();
    engine.subscribe(events.clone());
    Fixture {
        engine,
        events,
        clock,
    }
}

#[allow(dead_code)]
pub fn auth(method: &str) -> (&'static str, ConditionConfig) {
    ("auth_method", ConditionConfig::new().with("authmethod", method))
}

#[allow(dead_code)]
pub fn completed(course_id: i64) -> (&'static str, ConditionConfig) {
    ("course_completed", ConditionConfig::new().with("courseid", course_id))
}

#[allow(dead_code)]
pub fn draft(
    cohort_id: i64,
    combinator: Combinator,
    conditions: Vec<(&str, ConditionConfig)>,
) -> RuleDraft {
    let mut draft = RuleDraft::new("Test rule", cohort_id);
    draft.combinator = combinator;
    draft.conditions = conditions
        .into_iter()
        .map(|(kind, config)| ConditionRecord::new(kind, config))
        .collect();
    draft
}

/// Save a rule and enable it
#[allow(dead_code)]
pub fn enabled_rule(engine: &mut Engine, draft: &RuleDraft) -> i64 {
    let rule_id = save_rule(engine, draft).unwrap();
    let toggled = toggle_rule_enabled(engine, rule_id).unwrap();
    assert!(toggled.enabled);
    rule_id
}

#[allow(dead_code)]
pub fn members(engine: &Engine, cohort_id: i64) -> Vec<i64> {
    CohortRepo::members(engine.conn(), cohort_id)
        .unwrap()
        .into_iter()
        .collect()
}

#[allow(dead_code)]
pub fn add_members(engine: &Engine, cohort_id: i64, user_ids: &[i64]) {
    for user_id in user_ids {
        CohortRepo::add_member(engine.conn(), cohort_id, *user_id, NOW).unwrap();
    }
}
