//! Error types for reconciliation

use std::fmt;

use thiserror::Error;

use crate::client::ClientError;
use crate::effect::Effect;
use crate::rule::CollectionScope;
use crate::schema::SchemaError;

/// Errors that abort a reconciliation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Observed state could not be fetched; nothing was written
    #[error("Failed to read {scope}: {source}")]
    RemoteRead {
        scope: CollectionScope,
        source: ClientError,
    },

    /// A write failed; earlier steps of the plan have already been applied
    #[error("Failed to write {scope} at step {step} ({operation}): {source}")]
    RemoteWrite {
        scope: CollectionScope,
        step: usize,
        operation: Effect,
        source: ClientError,
    },

    /// The API version has no known apply strategy
    #[error("Unsupported API version '{0}' (expected v2 or v3)")]
    StrategyUnsupported(String),

    /// Desired rules do not fit the collection schema
    #[error("Invalid rules for {scope}: {}", join_errors(errors))]
    InvalidRule {
        scope: CollectionScope,
        errors: Vec<RuleError>,
    },

    /// The collection cannot be owned by this parent type
    #[error("{} cannot be defined on a {}", scope.collection, scope.parent.parent_type)]
    CollectionNotAllowed { scope: CollectionScope },
}

/// Schema error for the rule at a desired position
#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    pub position: usize,
    pub error: SchemaError,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule #{}: {}", self.position, self.error)
    }
}

fn join_errors(errors: &[RuleError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
