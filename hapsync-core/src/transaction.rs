//! Transaction - Trait for the remote configuration transaction
//!
//! The reconciler never opens or closes transactions; it only passes the id
//! through to the collection client. Callers wrap a run of reconciliations in
//! begin / commit, and roll back when any of them fails.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque transaction handle issued by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while managing a transaction
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    #[error("Failed to commit transaction {id}: {message}")]
    Commit { id: TransactionId, message: String },

    #[error("Failed to roll back transaction {id}: {message}")]
    Rollback { id: TransactionId, message: String },
}

pub type TransactionResult<T> = Result<T, TransactionError>;

/// Begin / commit / rollback over the remote configuration
#[async_trait]
pub trait Transactions: Send + Sync {
    /// Open a transaction against the current configuration version
    async fn begin(&self) -> TransactionResult<TransactionId>;

    /// Commit a transaction, making its changes live
    async fn commit(&self, id: &TransactionId) -> TransactionResult<()>;

    /// Discard a transaction
    async fn rollback(&self, id: &TransactionId) -> TransactionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_error_display() {
        let error = TransactionError::Commit {
            id: TransactionId::new("273e3385"),
            message: "version mismatch".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to commit transaction 273e3385: version mismatch"
        );
    }
}
