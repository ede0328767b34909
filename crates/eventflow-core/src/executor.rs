//! Query executor abstraction.
//!
//! The statement engine behind the stores is an external collaborator.
//! Stores hand it a named operation plus positional or named parameters
//! and get back either a row set or an affected-row count. Operation
//! names follow a `table/action` convention, e.g. `"event/persist"` or
//! `"certificate/revoke-past-validity"`.

use async_trait::async_trait;
use thiserror::Error;

/// A single result row: an ordered column-name-to-value mapping.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Parameters bound to an operation.
///
/// Persist operations pass a named record; everything else passes
/// positional values. Values are always bound, never spliced into
/// statement text, which is what keeps caller-supplied name lists safe.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// No parameters.
    None,
    /// Positional parameters, bound in order.
    Positional(Vec<serde_json::Value>),
    /// Named parameters, bound by column name.
    Named(Row),
}

impl Params {
    /// Builds positional parameters from anything iterable as JSON values.
    pub fn positional<I>(values: I) -> Self
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        Self::Positional(values.into_iter().collect())
    }

    /// Builds named parameters from `(column, value)` pairs.
    pub fn named<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self::Named(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Outcome of a single executed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// A row set, in the order the engine returned it.
    Rows(Vec<Row>),
    /// The number of rows a mutation touched.
    Affected(u64),
}

impl QueryOutcome {
    /// Consumes the outcome as a row set. An `Affected` outcome yields
    /// an empty set.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) => Vec::new(),
        }
    }

    /// The number of rows a mutation touched. A `Rows` outcome yields 0.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Rows(_) => 0,
            Self::Affected(count) => *count,
        }
    }
}

/// Causal failure raised by the executor.
///
/// `DuplicateKey` is the one storage-specific code the stores inspect:
/// the certificate vault and the association indices treat it as a
/// normal "no new row" outcome rather than an error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutorError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key on {constraint}")]
    DuplicateKey {
        /// The constraint or key that was violated.
        constraint: String,
    },

    /// The engine failed to run the operation.
    #[error("operation {operation} failed: {message}")]
    Query {
        /// The operation that failed.
        operation: String,
        /// Engine-reported failure message.
        message: String,
    },

    /// A returned row could not be decoded into a record.
    #[error("could not decode row field {field}: {message}")]
    Decode {
        /// The column that failed to decode.
        field: String,
        /// What was wrong with the value.
        message: String,
    },
}

impl ExecutorError {
    /// Whether this failure is a uniqueness-constraint violation.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

/// Boundary trait for the statement engine.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes a named operation with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` when the engine rejects or fails the
    /// operation.
    async fn execute(&self, operation: &str, params: Params)
    -> Result<QueryOutcome, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::{ExecutorError, Params, QueryOutcome};

    #[test]
    fn test_into_rows_on_affected_outcome_is_empty() {
        assert!(QueryOutcome::Affected(3).into_rows().is_empty());
    }

    #[test]
    fn test_rows_affected_on_row_outcome_is_zero() {
        let outcome = QueryOutcome::Rows(vec![serde_json::Map::new()]);
        assert_eq!(outcome.rows_affected(), 0);
    }

    #[test]
    fn test_duplicate_key_predicate() {
        let duplicate = ExecutorError::DuplicateKey {
            constraint: "certificate.PRIMARY".to_owned(),
        };
        let query = ExecutorError::Query {
            operation: "event/persist".to_owned(),
            message: "connection refused".to_owned(),
        };
        assert!(duplicate.is_duplicate_key());
        assert!(!query.is_duplicate_key());
    }

    #[test]
    fn test_named_params_preserve_insertion_order() {
        let params = Params::named([
            ("id", serde_json::json!("a")),
            ("domain", serde_json::json!("b")),
        ]);
        match params {
            Params::Named(row) => {
                let keys: Vec<&String> = row.keys().collect();
                assert_eq!(keys, ["id", "domain"]);
            }
            other => panic!("expected Named, got {other:?}"),
        }
    }
}
