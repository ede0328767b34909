//! External-reference index — caller-supplied `eid` associations.

use std::sync::Arc;

use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor};
use eventflow_core::record::Event;

const TABLE: Table = Table::EventExternal;

mod ops {
    pub const PERSIST: &str = "event_eid/persist";
    pub const DELETE: &str = "event_eid/delete";
    pub const READ_BY_EVENT_ID: &str = "event_eid/read-by-event_id";
    pub const READ_BY_EID: &str = "event_eid/read-by-eid";
    pub const READ_BY_EID_DOMAIN: &str = "event_eid/read-by-eid-domain";
}

fn read_error(cause: ExecutorError) -> StoreError {
    StoreError::Read { table: TABLE, cause }
}

fn decode_events(rows: Vec<eventflow_core::executor::Row>) -> Result<Vec<Event>, StoreError> {
    rows.iter()
        .map(Event::from_row)
        .collect::<Result<_, _>>()
        .map_err(read_error)
}

/// Pure association table between events and external identifiers.
///
/// Same duplicate policy as the correlation index: persisting an
/// existing tuple is `Ok(false)`, not an error.
#[derive(Clone)]
pub struct ExternalStore {
    executor: Arc<dyn QueryExecutor>,
}

impl ExternalStore {
    /// Creates a store over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Associates an event with an external identifier. Returns whether
    /// a new row was written; a duplicate tuple is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` on any failure other than the
    /// duplicate constraint.
    pub async fn persist(&self, event_id: &str, eid: &str) -> Result<bool, StoreError> {
        let params =
            Params::positional([serde_json::json!(event_id), serde_json::json!(eid)]);
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
    pub async fn delete(&self, event_id: &str, eid: &str) -> Result<bool, StoreError> {
        let params =
            Params::positional([serde_json::json!(event_id), serde_json::json!(eid)]);
        let outcome = self
            .executor
            .execute(ops::DELETE, params)
            .await
            .map_err(|cause| StoreError::Delete { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Reads every external identifier associated with an event.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_eids_by_event_id(&self, event_id: &str) -> Result<Vec<String>, StoreError> {
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
            .map(|row| {
                row.get("eid")
                    .and_then(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| ExecutorError::Decode {
                        field: "eid".to_owned(),
                        message: "expected text".to_owned(),
                    })
            })
            .collect::<Result<_, _>>()
            .map_err(read_error)
    }

    /// Reads every event associated with an external identifier.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_events_by_eid(&self, eid: &str) -> Result<Vec<Event>, StoreError> {
        let outcome = self
            .executor
            .execute(ops::READ_BY_EID, Params::positional([serde_json::json!(eid)]))
            .await
            .map_err(read_error)?;
        decode_events(outcome.into_rows())
    }

    /// Reads every event in a domain associated with an external
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_events_by_domain_and_eid(
        &self,
        domain: &str,
        eid: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_BY_EID_DOMAIN,
                Params::positional([serde_json::json!(eid), serde_json::json!(domain)]),
            )
            .await
            .map_err(read_error)?;
        decode_events(outcome.into_rows())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eventflow_test_support::InMemoryExecutor;

    use super::ExternalStore;

    #[tokio::test]
    async fn test_duplicate_association_reports_no_new_row() {
        let store = ExternalStore::new(Arc::new(InMemoryExecutor::default()));

        assert!(store.persist("e1", "invoice-9").await.unwrap());
        assert!(!store.persist("e1", "invoice-9").await.unwrap());
    }

    #[tokio::test]
    async fn test_eids_read_back_per_event() {
        let store = ExternalStore::new(Arc::new(InMemoryExecutor::default()));
        store.persist("e1", "invoice-9").await.unwrap();
        store.persist("e1", "order-3").await.unwrap();
        store.persist("e2", "invoice-9").await.unwrap();

        let eids = store.read_eids_by_event_id("e1").await.unwrap();

        assert_eq!(eids, ["invoice-9", "order-3"]);
    }

    #[tokio::test]
    async fn test_delete_then_delete_again_reports_false() {
        let store = ExternalStore::new(Arc::new(InMemoryExecutor::default()));
        store.persist("e1", "invoice-9").await.unwrap();

        assert!(store.delete("e1", "invoice-9").await.unwrap());
        assert!(!store.delete("e1", "invoice-9").await.unwrap());
    }
}
