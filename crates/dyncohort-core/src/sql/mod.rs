//! SQL fragment composition
//!
//! Conditions never see each other. Each one receives the shared
//! [`CompositionContext`] for the current evaluation pass, draws fresh table
//! and parameter aliases from it and returns a [`Fragment`] correlated to the
//! outer users alias `u`.

pub mod context;
pub mod fragment;
pub mod query;

pub use context::CompositionContext;
pub use fragment::{Fragment, Params, SqlValue};
pub use query::{matching_users_query, MatchingQuery};

/// Alias of the outer users table every fragment correlates against
pub const USER_ALIAS: &str = "u";

/// Unconditionally false predicate
pub const NEVER_WHERE: &str = "1=0";
