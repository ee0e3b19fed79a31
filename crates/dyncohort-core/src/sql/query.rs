use super::context::CompositionContext;
use super::fragment::{scan_placeholders, Fragment, Params};
use super::USER_ALIAS;

/// Executable matching-users statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingQuery {
    pub sql: String,
    pub params: Params,
}

impl MatchingQuery {
    /// Placeholders in `sql` with no entry in `params`
    pub fn unbound_placeholders(&self) -> Vec<String> {
        let mut names = scan_placeholders(&self.sql);
        names.sort();
        names.dedup();
        names.retain(|name| !self.params.contains_key(name));
        names
    }
}

/// Wrap a rule's composed fragment into the final user-id query
///
/// Deleted users never match. `restrict_to_user` narrows the query to one
/// user for real-time processing.
pub fn matching_users_query(
    fragment: &Fragment,
    ctx: &mut CompositionContext,
    restrict_to_user: Option<i64>,
) -> MatchingQuery {
    let mut params = fragment.params().clone();
    let mut sql = format!(
        "SELECT DISTINCT {u}.id FROM users {u}",
        u = USER_ALIAS
    );
    if !fragment.join().trim().is_empty() {
        sql.push(' ');
        sql.push_str(fragment.join().trim());
    }
    sql.push_str(&format!(
        " WHERE {u}.deleted = 0 AND ({w})",
        u = USER_ALIAS,
        w = fragment.where_clause().trim()
    ));
    if let Some(user_id) = restrict_to_user {
        let placeholder = ctx.bind(&mut params, user_id);
        sql.push_str(&format!(" AND {}.id = {}", USER_ALIAS, placeholder));
    }
    sql.push_str(&format!(" ORDER BY {}.id", USER_ALIAS));

    MatchingQuery { sql, params }
}
