//! hapsync Core
//!
//! Reconciles ordered rule collections (HTTP/TCP rules, ACLs, checks) against a
//! remote API that can neither diff nor reorder them. Desired and observed
//! lists are matched by content-derived identity keys; any difference leads to
//! a full rewrite of the collection using the strategy of the API version.

pub mod client;
pub mod differ;
pub mod document;
pub mod effect;
pub mod error;
pub mod key;
pub mod plan;
pub mod reconciler;
pub mod rule;
pub mod schema;
pub mod strategy;
pub mod transaction;

pub use client::{ClientError, ClientResult, RuleCollectionClient};
pub use error::ReconcileError;
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerConfig};
pub use rule::{Collection, CollectionScope, ObservedRule, ParentId, ParentType, Rule, Value};
pub use strategy::{ApiVersion, ApplyStrategy, select_strategy};
