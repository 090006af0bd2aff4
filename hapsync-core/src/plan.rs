//! Plan - Ordered list of Effects for one collection
//!
//! A Plan is built from the observed list, the target list and the apply
//! strategy. No side effects occur until the Plan is executed by the
//! reconciler.

use std::fmt;

use crate::effect::Effect;
use crate::rule::{ObservedRule, Rule};
use crate::strategy::ApplyStrategy;

/// Plan containing Effects to be executed in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Delete { .. } => summary.delete += 1,
                Effect::Create { .. } => summary.create += 1,
                Effect::ReplaceAll(_) => summary.replace += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub delete: usize,
    pub create: usize,
    pub replace: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to delete, {} to create, {} bulk replace",
            self.delete, self.create, self.replace
        )
    }
}

/// Turn a target list into the write sequence for a strategy
///
/// `BulkReplace` writes the target in one call. `IncrementalIndexed` deletes
/// every observed rule from the highest remote index down, since the API
/// renumbers after each delete, then creates the target rules at 0..n.
/// There is one delete per observed rule, even when the API reported the
/// same index twice.
pub fn sequence(observed: &[ObservedRule], target: &[Rule], strategy: ApplyStrategy) -> Plan {
    let mut plan = Plan::new();

    match strategy {
        ApplyStrategy::BulkReplace => {
            plan.add(Effect::ReplaceAll(target.to_vec()));
        }
        ApplyStrategy::IncrementalIndexed => {
            let mut indices: Vec<usize> = observed.iter().map(|o| o.index).collect();
            indices.sort_by(|a, b| b.cmp(a));
            for index in indices {
                plan.add(Effect::Delete { index });
            }
            for (index, rule) in target.iter().enumerate() {
                plan.add(Effect::Create {
                    index,
                    rule: rule.clone(),
                });
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(indices: &[usize]) -> Vec<ObservedRule> {
        indices
            .iter()
            .map(|&i| ObservedRule::new(i, Rule::of_type("allow")))
            .collect()
    }

    #[test]
    fn empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.summary(), PlanSummary::default());
    }

    #[test]
    fn incremental_deletes_high_to_low() {
        let plan = sequence(&observed(&[0, 1, 2]), &[], ApplyStrategy::IncrementalIndexed);

        assert_eq!(
            plan.effects(),
            &[
                Effect::Delete { index: 2 },
                Effect::Delete { index: 1 },
                Effect::Delete { index: 0 },
            ]
        );
    }

    #[test]
    fn incremental_deletes_before_creates() {
        let target = vec![Rule::of_type("deny"), Rule::of_type("allow")];

        let plan = sequence(
            &observed(&[1, 0]),
            &target,
            ApplyStrategy::IncrementalIndexed,
        );

        assert_eq!(
            plan.effects(),
            &[
                Effect::Delete { index: 1 },
                Effect::Delete { index: 0 },
                Effect::Create {
                    index: 0,
                    rule: Rule::of_type("deny")
                },
                Effect::Create {
                    index: 1,
                    rule: Rule::of_type("allow")
                },
            ]
        );
        let summary = plan.summary();
        assert_eq!(summary.delete, 2);
        assert_eq!(summary.create, 2);
    }

    #[test]
    fn repeated_indices_keep_one_delete_per_rule() {
        let observed = vec![
            ObservedRule::new(0, Rule::of_type("deny")),
            ObservedRule::new(0, Rule::of_type("allow")),
        ];

        let plan = sequence(&observed, &[], ApplyStrategy::IncrementalIndexed);

        assert_eq!(
            plan.effects(),
            &[Effect::Delete { index: 0 }, Effect::Delete { index: 0 }]
        );
        assert_eq!(plan.summary().delete, observed.len());
    }

    #[test]
    fn bulk_replace_is_a_single_write() {
        let target = vec![Rule::of_type("set-header").with("hdr_name", "X-Foo")];

        let plan = sequence(&observed(&[0, 1]), &target, ApplyStrategy::BulkReplace);

        assert_eq!(plan.effects(), &[Effect::ReplaceAll(target)]);
        assert_eq!(
            plan.summary().to_string(),
            "0 to delete, 0 to create, 1 bulk replace"
        );
    }
}
