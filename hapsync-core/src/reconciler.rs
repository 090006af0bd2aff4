//! Reconciler - Bring a remote rule collection to its desired state
//!
//! The Reconciler reads the observed collection, diffs it against the desired
//! list and, when anything differs, executes the Plan for its strategy one
//! Effect at a time. This is where side effects actually occur. Transactions
//! are the caller's business: the scope carries one through untouched.

use crate::client::RuleCollectionClient;
use crate::differ::{DiffResult, diff};
use crate::effect::Effect;
use crate::error::{ReconcileError, RuleError};
use crate::plan::{Plan, sequence};
use crate::rule::{CollectionScope, ObservedRule, Rule};
use crate::schema::schema_for;
use crate::strategy::ApplyStrategy;

/// Reconciler configuration
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// If true, plan but skip the remote writes
    pub dry_run: bool,
}

/// Whether a plan was sent to the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Applied,
    /// Dry-run: nothing was written
    Skipped,
}

/// Result of applying a target list
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub plan: Plan,
    pub status: ApplyStatus,
}

/// Result of reconciling one collection
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Observed state already matches; no write was issued
    NoChange(DiffResult),
    Changed {
        diff: DiffResult,
        report: ApplyReport,
    },
}

impl ReconcileOutcome {
    pub fn diff(&self) -> &DiffResult {
        match self {
            ReconcileOutcome::NoChange(diff) => diff,
            ReconcileOutcome::Changed { diff, .. } => diff,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, ReconcileOutcome::Changed { .. })
    }
}

/// Check desired rules against the collection schema and parent type
pub fn validate(scope: &CollectionScope, desired: &[Rule]) -> Result<(), ReconcileError> {
    let schema = schema_for(scope.collection);
    if !schema.allows_parent(scope.parent.parent_type) {
        return Err(ReconcileError::CollectionNotAllowed {
            scope: scope.clone(),
        });
    }

    let errors: Vec<RuleError> = desired
        .iter()
        .enumerate()
        .filter_map(|(position, rule)| schema.validate(rule).err().map(|e| (position, e)))
        .flat_map(|(position, errors)| {
            errors
                .into_iter()
                .map(move |error| RuleError { position, error })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::InvalidRule {
            scope: scope.clone(),
            errors,
        })
    }
}

/// Reconciler that writes through a collection client
pub struct Reconciler<C: RuleCollectionClient> {
    client: C,
    strategy: ApplyStrategy,
    config: ReconcilerConfig,
}

impl<C: RuleCollectionClient> Reconciler<C> {
    pub fn new(client: C, strategy: ApplyStrategy) -> Self {
        Self {
            client,
            strategy,
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn strategy(&self) -> ApplyStrategy {
        self.strategy
    }

    /// Read the observed collection
    pub async fn observe(
        &self,
        scope: &CollectionScope,
    ) -> Result<Vec<ObservedRule>, ReconcileError> {
        self.client
            .list(scope)
            .await
            .map_err(|source| ReconcileError::RemoteRead {
                scope: scope.clone(),
                source,
            })
    }

    /// Diff the desired list against the remote state without writing
    pub async fn preview(
        &self,
        scope: &CollectionScope,
        desired: &[Rule],
    ) -> Result<(Vec<ObservedRule>, DiffResult), ReconcileError> {
        validate(scope, desired)?;
        let observed = self.observe(scope).await?;
        let result = diff(schema_for(scope.collection), desired, &observed);
        Ok((observed, result))
    }

    /// Reconcile one collection, skipping all writes when nothing differs
    pub async fn reconcile(
        &self,
        scope: &CollectionScope,
        desired: &[Rule],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let (observed, result) = self.preview(scope, desired).await?;

        let Some(reason) = result.reason else {
            log::info!("{}: up to date ({} rules)", scope, desired.len());
            return Ok(ReconcileOutcome::NoChange(result));
        };

        log::info!("{}: {}, rewriting with {}", scope, reason, self.strategy);
        let plan = sequence(&observed, desired, self.strategy);
        let report = self.execute(scope, plan).await?;

        Ok(ReconcileOutcome::Changed {
            diff: result,
            report,
        })
    }

    /// Unconditionally rewrite a collection with the target list
    pub async fn apply(
        &self,
        scope: &CollectionScope,
        target: &[Rule],
    ) -> Result<ApplyReport, ReconcileError> {
        validate(scope, target)?;
        let observed = self.observe(scope).await?;
        let plan = sequence(&observed, target, self.strategy);
        self.execute(scope, plan).await
    }

    /// Execute a Plan in order, stopping at the first failed write
    async fn execute(
        &self,
        scope: &CollectionScope,
        plan: Plan,
    ) -> Result<ApplyReport, ReconcileError> {
        if self.config.dry_run {
            log::info!("{}: dry-run, skipping {}", scope, plan.summary());
            return Ok(ApplyReport {
                plan,
                status: ApplyStatus::Skipped,
            });
        }

        for (step, effect) in plan.effects().iter().enumerate() {
            log::debug!("{}: step {} {}", scope, step, effect);
            let result = match effect {
                Effect::Delete { index } => self.client.delete_one(scope, *index).await,
                Effect::Create { index, rule } => {
                    self.client.create_one(scope, *index, rule).await
                }
                Effect::ReplaceAll(rules) => self.client.replace_all(scope, rules).await,
            };

            if let Err(source) = result {
                return Err(ReconcileError::RemoteWrite {
                    scope: scope.clone(),
                    step,
                    operation: effect.clone(),
                    source,
                });
            }
        }

        Ok(ApplyReport {
            plan,
            status: ApplyStatus::Applied,
        })
    }
}
