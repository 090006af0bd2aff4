//! Effect - A single remote write against a rule collection

use std::fmt;

use crate::rule::Rule;

/// One mutation issued through the collection client
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Delete the rule at a remote index
    Delete { index: usize },
    /// Create a rule at a remote index
    Create { index: usize, rule: Rule },
    /// Replace the whole collection in one write
    ReplaceAll(Vec<Rule>),
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Delete { index } => write!(f, "delete #{}", index),
            Effect::Create { index, rule } => write!(f, "create #{} ({})", index, rule.summary()),
            Effect::ReplaceAll(rules) => write!(f, "replace all ({} rules)", rules.len()),
        }
    }
}
