//! Correlation index — `(domain, cpid)` associations per event.

use std::sync::Arc;

use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor};
use eventflow_core::record::{CorrelationKey, Event};

const TABLE: Table = Table::EventCorrelation;

mod ops {
    pub const PERSIST: &str = "event_cpid/persist";
    pub const DELETE: &str = "event_cpid/delete";
    pub const READ_BY_EVENT_ID: &str = "event_cpid/read-by-event_id";
    pub const READ_BY_CPID_DOMAIN: &str = "event_cpid/read-by-cpid-domain";
}

fn read_error(cause: ExecutorError) -> StoreError {
    StoreError::Read { table: TABLE, cause }
}

/// Pure association table between events and correlation keys.
///
/// Associations are facts, not lifecycles: a tuple exists or it does
/// not. Persisting an already-present tuple reports `false` instead of
/// raising, the same duplicate policy the certificate vault follows.
#[derive(Clone)]
pub struct CorrelationStore {
    executor: Arc<dyn QueryExecutor>,
}

impl CorrelationStore {
    /// Creates a store over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Associates an event with a `(domain, cpid)` key. Returns whether
    /// a new row was written; a duplicate tuple is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` on any failure other than the
    /// duplicate constraint.
    pub async fn persist(
        &self,
        event_id: &str,
        domain: &str,
        cpid: &str,
    ) -> Result<bool, StoreError> {
        let params = Params::positional([
            serde_json::json!(event_id),
            serde_json::json!(domain),
            serde_json::json!(cpid),
        ]);
        match self.executor.execute(ops::PERSIST, params).await {
            Ok(outcome) => Ok(outcome.rows_affected() > 0),
            Err(cause) if cause.is_duplicate_key() => Ok(false),
            Err(cause) => Err(StoreError::Persist { table: TABLE, cause }),
        }
    }

    /// Removes an association. Zero matching rows is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Delete` when the delete fails.
    pub async fn delete(
        &self,
        event_id: &str,
        domain: &str,
        cpid: &str,
    ) -> Result<bool, StoreError> {
        let params = Params::positional([
            serde_json::json!(event_id),
            serde_json::json!(domain),
            serde_json::json!(cpid),
        ]);
        let outcome = self
            .executor
            .execute(ops::DELETE, params)
            .await
            .map_err(|cause| StoreError::Delete { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Reads every correlation key associated with an event.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_keys_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Vec<CorrelationKey>, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_BY_EVENT_ID,
                Params::positional([serde_json::json!(event_id)]),
            )
            .await
            .map_err(read_error)?;
        outcome
            .into_rows()
            .iter()
            .map(CorrelationKey::from_row)
            .collect::<Result<_, _>>()
            .map_err(read_error)
    }

    /// Reads every event associated with a `(domain, cpid)` key, in
    /// event insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_events_by_domain_and_cpid(
        &self,
        domain: &str,
        cpid: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_BY_CPID_DOMAIN,
                Params::positional([serde_json::json!(cpid), serde_json::json!(domain)]),
            )
            .await
            .map_err(read_error)?;
        outcome
            .into_rows()
            .iter()
            .map(Event::from_row)
            .collect::<Result<_, _>>()
            .map_err(read_error)
    }
}
