//! Differ - Compare a desired rule list with the observed one
//!
//! The remote API has no move primitive and does not report positions
//! reliably, so the result is deliberately coarse: any difference in content,
//! membership or order means the whole collection is rewritten from the
//! desired list.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::key::{IdentityCollision, IdentityKey, derive_key, find_collisions};
use crate::rule::{ObservedRule, Rule};
use crate::schema::CollectionSchema;

/// How a single rule relates to the observed collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Same key at the same position with identical fields
    Unchanged,
    /// Same key at the same position, some non-key field differs
    ContentChanged,
    /// Key exists in the observed list at another position
    Moved { from: usize },
    /// Key does not exist in the observed list
    New,
    /// Observed key that is not desired anymore
    Removed,
}

/// Classification of one rule
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub key: IdentityKey,
    pub classification: Classification,
    /// Position in the desired list (None for removed rules)
    pub position: Option<usize>,
}

/// Why a collection has to be rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileReason {
    LengthChanged { desired: usize, observed: usize },
    ContentChanged,
    Reordered,
    MembershipChanged,
}

impl fmt::Display for ReconcileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileReason::LengthChanged { desired, observed } => {
                write!(f, "rule count changed ({} -> {})", observed, desired)
            }
            ReconcileReason::ContentChanged => write!(f, "rule content changed"),
            ReconcileReason::Reordered => write!(f, "rules reordered"),
            ReconcileReason::MembershipChanged => write!(f, "rules added or removed"),
        }
    }
}

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
    pub reason: Option<ReconcileReason>,
    pub collisions: Vec<IdentityCollision>,
    target: Vec<Rule>,
}

impl DiffResult {
    pub fn needs_reconciliation(&self) -> bool {
        self.reason.is_some()
    }

    /// The authoritative target list, present only when reconciliation is needed
    pub fn target(&self) -> Option<&[Rule]> {
        self.needs_reconciliation().then_some(self.target.as_slice())
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for entry in &self.entries {
            match entry.classification {
                Classification::Unchanged => summary.unchanged += 1,
                Classification::ContentChanged => summary.changed += 1,
                Classification::Moved { .. } => summary.moved += 1,
                Classification::New => summary.new += 1,
                Classification::Removed => summary.removed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub changed: usize,
    pub moved: usize,
    pub new: usize,
    pub removed: usize,
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} changed, {} moved, {} removed, {} unchanged",
            self.new, self.changed, self.moved, self.removed, self.unchanged
        )
    }
}

/// Compare the desired list with the observed list
///
/// Observed rules are ordered by remote index and projected onto the schema
/// before comparison. Keys are matched through last-write-wins maps, so
/// duplicate keys collapse; the duplicates in `desired` are reported in
/// [`DiffResult::collisions`].
pub fn diff(schema: &CollectionSchema, desired: &[Rule], observed: &[ObservedRule]) -> DiffResult {
    let collisions = find_collisions(schema, desired);
    for collision in &collisions {
        log::warn!("{}: {}", schema.collection, collision);
    }

    let mut observed: Vec<&ObservedRule> = observed.iter().collect();
    observed.sort_by_key(|o| o.index);
    let observed_rules: Vec<Rule> = observed.iter().map(|o| schema.project(&o.rule)).collect();

    let desired_keys: Vec<IdentityKey> = desired.iter().map(|r| derive_key(schema, r)).collect();
    let observed_keys: Vec<IdentityKey> = observed_rules
        .iter()
        .map(|r| derive_key(schema, r))
        .collect();

    let mut observed_positions: HashMap<&IdentityKey, usize> = HashMap::new();
    for (position, key) in observed_keys.iter().enumerate() {
        observed_positions.insert(key, position);
    }
    let desired_key_set: HashSet<&IdentityKey> = desired_keys.iter().collect();

    let mut entries = Vec::with_capacity(desired.len());
    for (position, (rule, key)) in desired.iter().zip(&desired_keys).enumerate() {
        let classification = match observed_keys.get(position) {
            Some(observed_key) if observed_key == key => {
                if *rule == observed_rules[position] {
                    Classification::Unchanged
                } else {
                    Classification::ContentChanged
                }
            }
            _ => match observed_positions.get(key) {
                Some(&from) => Classification::Moved { from },
                None => Classification::New,
            },
        };
        entries.push(DiffEntry {
            key: key.clone(),
            classification,
            position: Some(position),
        });
    }

    for key in &observed_keys {
        if !desired_key_set.contains(key) {
            entries.push(DiffEntry {
                key: key.clone(),
                classification: Classification::Removed,
                position: None,
            });
        }
    }

    let reason = if desired.len() != observed_rules.len() {
        Some(ReconcileReason::LengthChanged {
            desired: desired.len(),
            observed: observed_rules.len(),
        })
    } else if has(&entries, |c| c == Classification::ContentChanged) {
        Some(ReconcileReason::ContentChanged)
    } else if has(&entries, |c| matches!(c, Classification::Moved { .. })) {
        Some(ReconcileReason::Reordered)
    } else if has(&entries, |c| {
        matches!(c, Classification::New | Classification::Removed)
    }) {
        Some(ReconcileReason::MembershipChanged)
    } else {
        None
    };

    DiffResult {
        entries,
        reason,
        collisions,
        target: desired.to_vec(),
    }
}

fn has(entries: &[DiffEntry], predicate: impl Fn(Classification) -> bool) -> bool {
    entries.iter().any(|e| predicate(e.classification))
}
