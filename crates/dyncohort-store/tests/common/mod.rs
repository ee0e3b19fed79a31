use dyncohort_core::conditions::RuleScope;
use dyncohort_core::{
    compose, matching_users_query, Combinator, CompositionContext, ConditionConfig,
    ConditionRegistry,
};
use dyncohort_store::db::open_in_memory_migrated;
use dyncohort_store::matching::matching_user_ids;
use dyncohort_store::SqliteCatalog;
use rusqlite::Connection;

/// Clock used by every fixture query
#[allow(dead_code)]
pub const NOW: i64 = 1_700_000_000;

/// Users 1-3 are live, user 4 is deleted and matches nothing
///
/// - ann (1): manual auth, Melbourne, logged in yesterday, completed course 2,
///   student in course 2, enrolled manually, pets "Cats,Dogs", team Red,
///   tagged chess
/// - bob (2): ldap auth, Sydney, never logged in, student in category 1,
///   enrolled via self, pets "Dogs", team Blue, member of cohort 21
/// - cat (3): manual auth, melton, logged in 30 days ago, teacher in course 2,
///   suspended manual enrolment, pets "Horses", tagged hiking
const SEED: &str = "
INSERT INTO users (id, username, auth, deleted, city, email, country, timecreated, lastaccess) VALUES
    (1, 'ann', 'manual', 0, 'Melbourne', 'ann@example.com', 'AU', 1000, 1699913600),
    (2, 'bob', 'ldap',   0, 'Sydney',    'bob@example.com', 'NZ', 2000, 0),
    (3, 'cat', 'manual', 0, 'melton',    'cat@other.org',   'AU', 3000, 1697408000),
    (4, 'dan', 'manual', 1, 'Melbourne', 'dan@example.com', 'AU', 500,  1699999000);

INSERT INTO course_categories (id, name) VALUES (1, 'Science');
INSERT INTO course (id, fullname, category, enablecompletion) VALUES
    (2, 'Chemistry 101', 1, 1),
    (6, 'Physics 101', 1, 0);
INSERT INTO course_completions (userid, course, timecompleted) VALUES
    (1, 2, 1600000000),
    (3, 2, 0),
    (4, 2, 1600000000);

INSERT INTO context (id, contextlevel, instanceid, path) VALUES
    (1, 10, 0, '/1'),
    (3, 40, 1, '/1/3'),
    (15, 50, 2, '/1/3/15'),
    (16, 50, 6, '/1/3/16');

INSERT INTO role (id, shortname, name, sortorder) VALUES
    (3, 'editingteacher', 'Teacher', 1),
    (5, 'student', 'Student', 2);
INSERT INTO role_assignments (roleid, contextid, userid) VALUES
    (5, 15, 1),
    (5, 3, 2),
    (3, 15, 3);

INSERT INTO enrol_plugins (name, enabled) VALUES ('manual', 1), ('self', 1), ('guest', 0);
INSERT INTO auth_plugins (name, enabled) VALUES ('manual', 1), ('ldap', 1);
INSERT INTO enrol (id, enrol, courseid, status) VALUES (1, 'manual', 2, 0), (2, 'self', 2, 0);
INSERT INTO user_enrolments (enrolid, userid, status) VALUES (1, 1, 0), (2, 2, 0), (1, 3, 1);

INSERT INTO user_info_field (id, shortname, name, datatype, param1) VALUES
    (10, 'pets', 'Pets', 'multiselect', 'Cats
Dogs
Horses'),
    (11, 'team', 'Team', 'menu', 'Red
Blue'),
    (12, 'startdate', 'Start date', 'datetime', '');
INSERT INTO user_info_data (userid, fieldid, data) VALUES
    (1, 10, 'Cats,Dogs'),
    (2, 10, 'Dogs'),
    (3, 10, 'Horses'),
    (1, 11, 'Red'),
    (2, 11, 'Blue'),
    (1, 12, '1500000000'),
    (2, 12, '1800000000');

INSERT INTO tag (id, name) VALUES (30, 'chess'), (31, 'hiking');
INSERT INTO tag_instance (tagid, component, itemtype, itemid) VALUES
    (30, 'core', 'user', 1),
    (31, 'core', 'user', 3),
    (30, 'core', 'course', 2);

INSERT INTO cohort (id, name) VALUES (20, 'Target'), (21, 'Staff');
INSERT INTO cohort_members (cohortid, userid) VALUES (21, 2);
";

#[allow(dead_code)]
pub fn seeded() -> Connection {
    let conn = open_in_memory_migrated().unwrap();
    conn.execute_batch(SEED).unwrap();
    conn
}

/// Ids matched by conditions of the given kinds combined with `combinator`
#[allow(dead_code)]
pub fn matched(
    conn: &Connection,
    combinator: Combinator,
    conditions: Vec<(&str, ConditionConfig)>,
) -> Vec<i64> {
    let registry = ConditionRegistry::with_defaults();
    let catalog = SqliteCatalog::new(conn);
    let scope = RuleScope {
        rule_id: 1,
        cohort_id: 20,
    };
    let mut ctx = CompositionContext::new(NOW);
    let fragments = conditions
        .into_iter()
        .map(|(kind, config)| {
            registry
                .create(kind, config, &scope)
                .unwrap()
                .get_sql(&mut ctx, &catalog)
        })
        .collect();
    let fragment = compose(fragments, combinator).unwrap();
    let query = matching_users_query(&fragment, &mut ctx, None);
    matching_user_ids(conn, 1, &query)
        .unwrap()
        .into_iter()
        .collect()
}

#[allow(dead_code)]
pub fn matched_one(conn: &Connection, kind: &str, config: ConditionConfig) -> Vec<i64> {
    matched(conn, Combinator::And, vec![(kind, config)])
}
