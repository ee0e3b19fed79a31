pub mod condition;
pub mod rule;

pub use condition::{ConditionConfig, ConditionRecord};
pub use rule::{Combinator, Rule, RuleDraft};
