//! Platform lookups backed by the host tables
//!
//! Lookup failures are logged and reported as "missing" (or `None` for
//! context descendants), which makes the condition that asked for them
//! broken rather than widening a rule.

use dyncohort_core::catalog::{
    Catalog, CategoryInfo, CohortInfo, ContextInfo, CourseInfo, ProfileFieldInfo,
    ProfileFieldType, RoleInfo, TagInfo,
};
use rusqlite::{Connection, OptionalExtension, Params, Row};

pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn one<T, P, F>(&self, sql: &str, params: P, map: F) -> Option<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        match self.conn.query_row(sql, params, map).optional() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, sql, "catalog lookup failed");
                None
            }
        }
    }

    fn many<T, P, F>(&self, sql: &str, params: P, map: F) -> Vec<T>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.try_many(sql, params, map).unwrap_or_default()
    }

    fn try_many<T, P, F>(&self, sql: &str, params: P, map: F) -> Option<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let result = self.conn.prepare(sql).and_then(|mut stmt| {
            let values = stmt
                .query_map(params, map)?
                .collect::<rusqlite::Result<Vec<T>>>();
            values
        });
        match result {
            Ok(values) => Some(values),
            Err(err) => {
                tracing::warn!(error = %err, sql, "catalog lookup failed");
                None
            }
        }
    }
}

fn context_from_row(row: &Row<'_>) -> rusqlite::Result<ContextInfo> {
    Ok(ContextInfo {
        id: row.get(0)?,
        level: row.get(1)?,
        instance_id: row.get(2)?,
        path: row.get(3)?,
    })
}

fn role_from_row(row: &Row<'_>) -> rusqlite::Result<RoleInfo> {
    Ok(RoleInfo {
        id: row.get(0)?,
        shortname: row.get(1)?,
        name: row.get(2)?,
    })
}

impl Catalog for SqliteCatalog<'_> {
    fn course(&self, id: i64) -> Option<CourseInfo> {
        self.one(
            "SELECT id, fullname, category, enablecompletion FROM course WHERE id = ?",
            [id],
            |row| {
                Ok(CourseInfo {
                    id: row.get(0)?,
                    fullname: row.get(1)?,
                    category: row.get(2)?,
                    completion_enabled: row.get(3)?,
                })
            },
        )
    }

    fn category(&self, id: i64) -> Option<CategoryInfo> {
        self.one(
            "SELECT id, name FROM course_categories WHERE id = ?",
            [id],
            |row| {
                Ok(CategoryInfo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
    }

    fn role(&self, id: i64) -> Option<RoleInfo> {
        self.one(
            "SELECT id, shortname, name FROM role WHERE id = ?",
            [id],
            role_from_row,
        )
    }

    fn roles(&self) -> Vec<RoleInfo> {
        self.many(
            "SELECT id, shortname, name FROM role ORDER BY sortorder, id",
            rusqlite::params![],
            role_from_row,
        )
    }

    fn enabled_enrol_methods(&self) -> Vec<String> {
        self.many(
            "SELECT name FROM enrol_plugins WHERE enabled = 1 ORDER BY name",
            rusqlite::params![],
            |row| row.get(0),
        )
    }

    fn enabled_auth_methods(&self) -> Vec<String> {
        self.many(
            "SELECT name FROM auth_plugins WHERE enabled = 1 ORDER BY name",
            rusqlite::params![],
            |row| row.get(0),
        )
    }

    fn context(&self, level: i64, instance_id: i64) -> Option<ContextInfo> {
        self.one(
            "SELECT id, contextlevel, instanceid, path FROM context
             WHERE contextlevel = ? AND instanceid = ?",
            [level, instance_id],
            context_from_row,
        )
    }

    fn child_context_ids(&self, context: &ContextInfo) -> Option<Vec<i64>> {
        self.try_many(
            "SELECT id FROM context WHERE path LIKE ? ESCAPE '\\' ORDER BY id",
            [format!("{}/%", context.path.replace('%', "\\%").replace('_', "\\_"))],
            |row| row.get(0),
        )
    }

    fn profile_field(&self, shortname: &str) -> Option<ProfileFieldInfo> {
        let row = self.one(
            "SELECT id, shortname, name, datatype, param1 FROM user_info_field WHERE shortname = ?",
            [shortname],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;
        let (id, shortname, name, datatype, options) = row;
        let Some(datatype) = ProfileFieldType::parse(&datatype) else {
            tracing::warn!(
                shortname = %shortname,
                datatype = %datatype,
                "unsupported profile field type"
            );
            return None;
        };
        let options = match datatype {
            ProfileFieldType::Menu
            | ProfileFieldType::Multiselect
            | ProfileFieldType::Autocomplete => options
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Some(ProfileFieldInfo {
            id,
            shortname,
            name,
            datatype,
            options,
        })
    }

    fn tag(&self, id: i64) -> Option<TagInfo> {
        self.one("SELECT id, name FROM tag WHERE id = ?", [id], |row| {
            Ok(TagInfo {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
    }

    fn cohort(&self, id: i64) -> Option<CohortInfo> {
        self.one(
            "SELECT id, name, component FROM cohort WHERE id = ?",
            [id],
            |row| {
                Ok(CohortInfo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    component: row.get(2)?,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_migrated;
    use dyncohort_core::catalog::{CONTEXT_COURSE, CONTEXT_COURSECAT};

    fn setup() -> Connection {
        let conn = open_in_memory_migrated().unwrap();
        conn.execute_batch(
            "INSERT INTO context (id, contextlevel, instanceid, path) VALUES
                 (1, 10, 0, '/1'), (3, 40, 1, '/1/3'), (15, 50, 2, '/1/3/15'), (31, 40, 9, '/1/31');
             INSERT INTO course (id, fullname, category, enablecompletion) VALUES (2, 'Chemistry', 1, 1);
             INSERT INTO enrol_plugins (name, enabled) VALUES ('manual', 1), ('self', 0);
             INSERT INTO user_info_field (id, shortname, name, datatype, param1)
                 VALUES (4, 'team', 'Team', 'menu', 'Red\nBlue\n');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_course_lookup() {
        let conn = setup();
        let catalog = SqliteCatalog::new(&conn);
        let course = catalog.course(2).unwrap();
        assert!(course.completion_enabled);
        assert!(catalog.course(3).is_none());
    }

    #[test]
    fn test_child_contexts_by_path() {
        let conn = setup();
        let catalog = SqliteCatalog::new(&conn);
        let category = catalog.context(CONTEXT_COURSECAT, 1).unwrap();
        assert_eq!(catalog.child_context_ids(&category), Some(vec![15]));
        assert_eq!(catalog.context(CONTEXT_COURSE, 2).map(|c| c.id), Some(15));
        assert_eq!(catalog.system_context().map(|c| c.id), Some(1));
    }

    #[test]
    fn test_only_enabled_enrol_methods() {
        let conn = setup();
        assert_eq!(
            SqliteCatalog::new(&conn).enabled_enrol_methods(),
            vec!["manual".to_string()]
        );
    }

    #[test]
    fn test_menu_options_split_by_line() {
        let conn = setup();
        let field = SqliteCatalog::new(&conn).profile_field("team").unwrap();
        assert_eq!(field.datatype, ProfileFieldType::Menu);
        assert_eq!(field.options, vec!["Red".to_string(), "Blue".to_string()]);
    }

    #[test]
    fn test_failed_child_context_lookup_is_none() {
        let conn = Connection::open_in_memory().unwrap();
        // Untyped id column lets a non-integer id reach the row mapper.
        conn.execute_batch(
            "CREATE TABLE context (id, contextlevel INTEGER, instanceid INTEGER, path TEXT);
             INSERT INTO context VALUES
                 (3, 40, 1, '/1/3'), ('orphan', 50, 2, '/1/3/orphan');",
        )
        .unwrap();
        let catalog = SqliteCatalog::new(&conn);
        let category = catalog.context(CONTEXT_COURSECAT, 1).unwrap();
        assert_eq!(catalog.child_context_ids(&category), None);
    }
}
