//! Client - Trait abstracting a remote ordered rule collection
//!
//! A client talks to one remote API (e.g., the HAProxy Data Plane API) and
//! exposes the four collection operations the reconciler needs. Every call
//! is scoped by `(parent_type, parent_name, collection)` and carries the
//! caller's transaction, if any.

use std::future::Future;
use std::pin::Pin;

use crate::rule::{CollectionScope, ObservedRule, Rule};

/// Error type for client operations
#[derive(Debug)]
pub struct ClientError {
    pub message: String,
    /// HTTP status, when the remote API answered
    pub status: Option<u16>,
    pub scope: Option<CollectionScope>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref scope) = self.scope {
            write!(f, "[{}] ", scope)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            scope: None,
            cause: None,
        }
    }

    pub fn for_scope(mut self, scope: &CollectionScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote ordered rule collection
pub trait RuleCollectionClient: Send + Sync {
    /// Current remote state, each rule tagged with its remote index
    fn list<'a>(
        &'a self,
        scope: &'a CollectionScope,
    ) -> BoxFuture<'a, ClientResult<Vec<ObservedRule>>>;

    /// Insert one rule at a remote index
    fn create_one<'a>(
        &'a self,
        scope: &'a CollectionScope,
        index: usize,
        rule: &'a Rule,
    ) -> BoxFuture<'a, ClientResult<()>>;

    /// Delete the rule at a remote index
    fn delete_one<'a>(
        &'a self,
        scope: &'a CollectionScope,
        index: usize,
    ) -> BoxFuture<'a, ClientResult<()>>;

    /// Atomically replace the whole collection
    fn replace_all<'a>(
        &'a self,
        scope: &'a CollectionScope,
        rules: &'a [Rule],
    ) -> BoxFuture<'a, ClientResult<()>>;
}

/// Client implementation for Box<dyn RuleCollectionClient>
/// This enables dynamic dispatch for clients
impl RuleCollectionClient for Box<dyn RuleCollectionClient> {
    fn list<'a>(
        &'a self,
        scope: &'a CollectionScope,
    ) -> BoxFuture<'a, ClientResult<Vec<ObservedRule>>> {
        (**self).list(scope)
    }

    fn create_one<'a>(
        &'a self,
        scope: &'a CollectionScope,
        index: usize,
        rule: &'a Rule,
    ) -> BoxFuture<'a, ClientResult<()>> {
        (**self).create_one(scope, index, rule)
    }

    fn delete_one<'a>(
        &'a self,
        scope: &'a CollectionScope,
        index: usize,
    ) -> BoxFuture<'a, ClientResult<()>> {
        (**self).delete_one(scope, index)
    }

    fn replace_all<'a>(
        &'a self,
        scope: &'a CollectionScope,
        rules: &'a [Rule],
    ) -> BoxFuture<'a, ClientResult<()>> {
        (**self).replace_all(scope, rules)
    }
}
