//! Document - Desired rule collections grouped by parent
//!
//! ```json
//! { "type": "backend", "name": "web",
//!   "http_request_rules": [ { "type": "deny", "cond": "if", "cond_test": "{ src 10.0.0.0/8 }" } ],
//!   "acls": [ { "acl_name": "is_api", "criterion": "path_beg", "value": "/api" } ] }
//! ```
//!
//! Collections that a parent does not mention are left alone.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::key::{IdentityCollision, find_collisions};
use crate::reconciler::validate;
use crate::rule::{Collection, CollectionScope, ParentId, ParentType, Rule};
use crate::schema::schema_for;

/// Desired collections of one parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRules {
    #[serde(rename = "type")]
    pub parent_type: ParentType,
    pub name: String,
    #[serde(flatten)]
    pub collections: BTreeMap<Collection, Vec<Rule>>,
}

impl ParentRules {
    pub fn new(parent: ParentId) -> Self {
        Self {
            parent_type: parent.parent_type,
            name: parent.name,
            collections: BTreeMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: Collection, rules: Vec<Rule>) -> Self {
        self.collections.insert(collection, rules);
        self
    }

    pub fn parent(&self) -> ParentId {
        ParentId::new(self.parent_type, self.name.clone())
    }

    /// Managed collections of this parent with their desired rules
    pub fn scopes(&self) -> impl Iterator<Item = (CollectionScope, &[Rule])> {
        let parent = self.parent();
        self.collections.iter().map(move |(collection, rules)| {
            (
                CollectionScope::new(parent.clone(), *collection),
                rules.as_slice(),
            )
        })
    }
}

/// Desired state across every managed parent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub parents: Vec<ParentRules>,
}

impl DesiredState {
    pub fn scopes(&self) -> impl Iterator<Item = (CollectionScope, &[Rule])> {
        self.parents.iter().flat_map(ParentRules::scopes)
    }

    /// Validate every managed collection, collecting all errors
    pub fn validate(&self) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let mut seen = HashSet::new();
        for parent in &self.parents {
            let id = parent.parent();
            if !seen.insert(id.clone()) {
                issues.push(ValidationIssue::DuplicateParent(id));
            }
        }

        for (scope, rules) in self.scopes() {
            if let Err(e) = validate(&scope, rules) {
                issues.push(ValidationIssue::Rules(e));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Identity key collisions per collection; these are warnings, not errors
    pub fn collisions(&self) -> Vec<(CollectionScope, IdentityCollision)> {
        self.scopes()
            .flat_map(|(scope, rules)| {
                find_collisions(schema_for(scope.collection), rules)
                    .into_iter()
                    .map(move |collision| (scope.clone(), collision))
            })
            .collect()
    }
}

/// Problem found while validating a desired state
#[derive(Debug, thiserror::Error)]
pub enum ValidationIssue {
    #[error("{0} is defined more than once")]
    DuplicateParent(ParentId),

    #[error(transparent)]
    Rules(ReconcileError),
}
