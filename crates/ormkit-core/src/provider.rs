//! The backend seam: providers turn queries into storage operations.

use crate::error::Result;
use crate::query::Query;
use crate::row::Row;

/// What a provider hands back after executing a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result rows of a read; empty for writes.
    pub rows: Vec<Row>,
    /// Rows touched by a write; zero for reads.
    pub rows_affected: u64,
    /// Identifier generated by the backend for a create, when one was.
    pub last_inserted_id: Option<i64>,
}

impl QueryResult {
    /// A result with no rows and nothing affected.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A read result over the given rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }
}

/// A storage backend.
///
/// Implementations own their connection and all backend-specific
/// concerns: statement generation, schema synchronization, and
/// transaction control. Everything above this trait is backend-neutral.
pub trait Provider {
    /// Open the backend connection. Calling this on an already
    /// connected provider does nothing and succeeds.
    #[allow(clippy::result_large_err)]
    fn connect(&mut self) -> Result<()>;

    /// Close the backend connection. Safe to call when not connected.
    #[allow(clippy::result_large_err)]
    fn disconnect(&mut self) -> Result<()>;

    /// Whether the provider currently holds an open connection.
    fn is_connected(&self) -> bool;

    /// Execute one query, connecting and synchronizing schema first
    /// when necessary.
    #[allow(clippy::result_large_err)]
    fn execute(&mut self, query: &Query) -> Result<QueryResult>;

    /// Start a transaction.
    #[allow(clippy::result_large_err)]
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open transaction.
    #[allow(clippy::result_large_err)]
    fn commit_transaction(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    #[allow(clippy::result_large_err)]
    fn rollback_transaction(&mut self) -> Result<()>;

    /// Establish a named savepoint inside the open transaction.
    #[allow(clippy::result_large_err)]
    fn savepoint(&mut self, name: &str) -> Result<()>;

    /// Release a savepoint, keeping the work done since it.
    #[allow(clippy::result_large_err)]
    fn release_savepoint(&mut self, name: &str) -> Result<()>;

    /// Roll back to a savepoint, discarding the work done since it.
    #[allow(clippy::result_large_err)]
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()>;
}

#[allow(dead_code)]
fn assert_object_safe(_provider: &dyn Provider) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::row::{ColumnSet, Row};
    use crate::value::Value;

    #[test]
    fn test_empty_result() {
        let result = QueryResult::empty();
        assert!(result.rows.is_empty());
        assert_eq!(result.rows_affected, 0);
        assert_eq!(result.last_inserted_id, None);
    }

    #[test]
    fn test_from_rows_keeps_rows_only() {
        let columns = Arc::new(ColumnSet::new(vec!["id".to_string()]));
        let rows = vec![Row::new(vec![Value::BigInt(7)], Arc::clone(&columns))];
        let result = QueryResult::from_rows(rows);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows_affected, 0);
        assert_eq!(result.last_inserted_id, None);
    }
}
