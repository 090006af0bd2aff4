//! Identity keys - Content-based identity for rules
//!
//! The remote API does not keep positional indices stable, so rules are
//! matched by a key built from the fields that distinguish them. Position
//! never takes part in the key.
//!
//! Two desired rules with identical key fields collapse to one key. That
//! ambiguity is kept as-is and surfaced through [`find_collisions`].

use std::collections::BTreeMap;
use std::fmt;

use crate::rule::Rule;
use crate::schema::CollectionSchema;

/// Separator between key segments
pub const KEY_DELIMITER: char = '|';

/// Identity key of a rule within its collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the identity key of a rule
///
/// Segments follow the schema's key field order as `name=value`; an absent
/// field still contributes `name=` so segment positions never shift.
pub fn derive_key(schema: &CollectionSchema, rule: &Rule) -> IdentityKey {
    let segments: Vec<String> = schema
        .key_fields
        .iter()
        .map(|field| {
            let value = rule.get(field).map(|v| v.render()).unwrap_or_default();
            format!("{}={}", field, value)
        })
        .collect();

    IdentityKey(segments.join(&KEY_DELIMITER.to_string()))
}

/// Two or more desired rules sharing one identity key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCollision {
    pub key: IdentityKey,
    /// Positions of the colliding rules, ascending
    pub positions: Vec<usize>,
}

impl fmt::Display for IdentityCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions: Vec<String> = self.positions.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "rules at positions {} share identity key '{}'",
            positions.join(", "),
            self.key
        )
    }
}

/// Report every key shared by more than one rule
pub fn find_collisions(schema: &CollectionSchema, rules: &[Rule]) -> Vec<IdentityCollision> {
    let mut by_key: BTreeMap<IdentityKey, Vec<usize>> = BTreeMap::new();
    for (position, rule) in rules.iter().enumerate() {
        by_key
            .entry(derive_key(schema, rule))
            .or_default()
            .push(position);
    }

    let mut collisions: Vec<IdentityCollision> = by_key
        .into_iter()
        .filter(|(_, positions)| positions.len() > 1)
        .map(|(key, positions)| IdentityCollision { key, positions })
        .collect();
    collisions.sort_by_key(|c| c.positions[0]);
    collisions
}
