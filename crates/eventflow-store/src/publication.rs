//! Publication tracker — delivery lifecycle of published events.

use std::sync::Arc;

use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor};
use eventflow_core::record::{NewPublishedEvent, PublishedEvent};
use eventflow_core::status::PublicationStatus;

const TABLE: Table = Table::EventPublished;

mod ops {
    pub const PERSIST: &str = "event_published/persist";
    pub const READ_BY_EVENT_ID: &str = "event_published/read-by-event-id";
    pub const UPDATE_TO_CONSUMED_BY_HUB: &str = "event_published/update-to-consumed-by-hub";
    pub const UPDATE_TO_CONSUMED_BY_SPOKE: &str = "event_published/update-to-consumed-by-spoke";
    pub const UPDATE_TO_SUCCESS: &str = "event_published/update-to-success";
    pub const UPDATE_TO_FAILED: &str = "event_published/update-to-failed";
    pub const UPDATE_TO_ORPHAN: &str = "event_published/update-to-orphan";
}

fn read_error(cause: ExecutorError) -> StoreError {
    StoreError::Read { table: TABLE, cause }
}

/// Records publication attempts and advances their delivery status.
///
/// Rows are append-once-then-advance: created at `Created` and moved
/// only through the legal transitions of [`PublicationStatus`]. Each
/// transition checks the current status first — re-applying the current
/// status is an idempotent `Ok(false)`, an illegal pair is an
/// `IllegalTransition` error, and a missing row is `Ok(false)`.
#[derive(Clone)]
pub struct PublicationStore {
    executor: Arc<dyn QueryExecutor>,
}

impl PublicationStore {
    /// Creates a store over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Records a publication attempt at status `Created`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` when the write fails.
    pub async fn persist(&self, published: NewPublishedEvent) -> Result<bool, StoreError> {
        tracing::debug!(event_id = %published.event_id, publisher = %published.publisher,
            "recording publication");
        let params = Params::named([
            ("event_id", serde_json::json!(published.event_id)),
            ("publisher", serde_json::json!(published.publisher)),
        ]);
        let outcome = self
            .executor
            .execute(ops::PERSIST, params)
            .await
            .map_err(|cause| StoreError::Persist { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Reads a publication row by event id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when no row matches and
    /// `StoreError::Read` when the read itself fails.
    pub async fn read(&self, event_id: &str) -> Result<PublishedEvent, StoreError> {
        self.read_optional(event_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table: TABLE,
                id: event_id.to_owned(),
            })
    }

    async fn read_optional(&self, event_id: &str) -> Result<Option<PublishedEvent>, StoreError> {
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
            .first()
            .map(|row| PublishedEvent::from_row(row).map_err(read_error))
            .transpose()
    }

    async fn transition(
        &self,
        event_id: &str,
        target: PublicationStatus,
        operation: &'static str,
        params: Params,
    ) -> Result<bool, StoreError> {
        let Some(current) = self.read_optional(event_id).await? else {
            return Ok(false);
        };
        if current.status == target {
            // Re-applying the present status is a no-op, not an error.
            return Ok(false);
        }
        if !current.status.can_transition_to(target) {
            return Err(StoreError::IllegalTransition {
                table: TABLE,
                event_id: event_id.to_owned(),
                from: current.status.as_str(),
                to: target.as_str(),
            });
        }
        let outcome = self
            .executor
            .execute(operation, params)
            .await
            .map_err(|cause| StoreError::Update { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Marks the event as consumed by a hub.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` when the row is not in a
    /// status that may advance to `ConsumedByHub`, `StoreError::Update`
    /// when the update fails.
    pub async fn mark_consumed_by_hub(
        &self,
        event_id: &str,
        hub_id: &str,
    ) -> Result<bool, StoreError> {
        self.transition(
            event_id,
            PublicationStatus::ConsumedByHub,
            ops::UPDATE_TO_CONSUMED_BY_HUB,
            Params::positional([serde_json::json!(hub_id), serde_json::json!(event_id)]),
        )
        .await
    }

    /// Marks the event as consumed by a spoke.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` when the row is not in a
    /// status that may advance to `ConsumedBySpoke`, `StoreError::Update`
    /// when the update fails.
    pub async fn mark_consumed_by_spoke(
        &self,
        event_id: &str,
        spoke_id: &str,
    ) -> Result<bool, StoreError> {
        self.transition(
            event_id,
            PublicationStatus::ConsumedBySpoke,
            ops::UPDATE_TO_CONSUMED_BY_SPOKE,
            Params::positional([serde_json::json!(spoke_id), serde_json::json!(event_id)]),
        )
        .await
    }

    /// Marks delivery as successful. Terminal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` from another terminal
    /// status, `StoreError::Update` when the update fails.
    pub async fn mark_success(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(
            event_id,
            PublicationStatus::Success,
            ops::UPDATE_TO_SUCCESS,
            Params::positional([serde_json::json!(event_id)]),
        )
        .await
    }

    /// Marks delivery as failed. Terminal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` from another terminal
    /// status, `StoreError::Update` when the update fails.
    pub async fn mark_failed(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(
            event_id,
            PublicationStatus::Failed,
            ops::UPDATE_TO_FAILED,
            Params::positional([serde_json::json!(event_id)]),
        )
        .await
    }

    /// Marks the delivery outcome as undeterminable. Terminal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` from another terminal
    /// status, `StoreError::Update` when the update fails.
    pub async fn mark_orphan(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(
            event_id,
            PublicationStatus::Orphan,
            ops::UPDATE_TO_ORPHAN,
            Params::positional([serde_json::json!(event_id)]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eventflow_core::error::StoreError;
    use eventflow_core::record::NewPublishedEvent;
    use eventflow_core::status::PublicationStatus;
    use eventflow_test_support::{FailingExecutor, InMemoryExecutor};

    use super::PublicationStore;

    fn store() -> PublicationStore {
        PublicationStore::new(Arc::new(InMemoryExecutor::default()))
    }

    async fn publish(store: &PublicationStore, event_id: &str) {
        store
            .persist(NewPublishedEvent {
                event_id: event_id.to_owned(),
                publisher: "h1".to_owned(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_persist_starts_at_created() {
        let store = store();
        publish(&store, "e1").await;

        let published = store.read("e1").await.unwrap();

        assert_eq!(published.status, PublicationStatus::Created);
        assert_eq!(published.publisher, "h1");
        assert_eq!(published.consumed_by_hub, None);
        assert_eq!(published.consumed_by_spoke, None);
    }

    #[tokio::test]
    async fn test_success_is_idempotent() {
        let store = store();
        publish(&store, "e1").await;

        assert!(store.mark_success("e1").await.unwrap());
        // A second mark is a no-op, pinned as Ok(false).
        assert!(!store.mark_success("e1").await.unwrap());

        let published = store.read("e1").await.unwrap();
        assert_eq!(published.status, PublicationStatus::Success);
    }

    #[tokio::test]
    async fn test_consumed_by_hub_records_the_consumer() {
        let store = store();
        publish(&store, "e1").await;

        assert!(store.mark_consumed_by_hub("e1", "h2").await.unwrap());

        let published = store.read("e1").await.unwrap();
        assert_eq!(published.status, PublicationStatus::ConsumedByHub);
        assert_eq!(published.consumed_by_hub.as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn test_terminal_status_rejects_further_transitions() {
        let store = store();
        publish(&store, "e1").await;
        store.mark_failed("e1").await.unwrap();

        let result = store.mark_success("e1").await;

        match result {
            Err(StoreError::IllegalTransition { from, to, .. }) => {
                assert_eq!(from, "failed");
                assert_eq!(to, "success");
            }
            other => panic!("expected IllegalTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_consumed_statuses_do_not_cross() {
        let store = store();
        publish(&store, "e1").await;
        store.mark_consumed_by_hub("e1", "h2").await.unwrap();

        let result = store.mark_consumed_by_spoke("e1", "s1").await;

        assert!(matches!(
            result,
            Err(StoreError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_transition_on_missing_row_reports_false() {
        let store = store();

        assert!(!store.mark_success("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_executor_failure_is_wrapped_with_the_failing_operation_kind() {
        let store = PublicationStore::new(Arc::new(FailingExecutor));

        assert!(matches!(
            store
                .persist(NewPublishedEvent {
                    event_id: "e1".to_owned(),
                    publisher: "h1".to_owned(),
                })
                .await,
            Err(StoreError::Persist { .. })
        ));
        assert!(matches!(
            store.read("e1").await,
            Err(StoreError::Read { .. })
        ));
        // The transition guard reads before updating, so the failure
        // surfaces as a read error.
        assert!(matches!(
            store.mark_success("e1").await,
            Err(StoreError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn test_consumed_then_success_is_legal() {
        let store = store();
        publish(&store, "e1").await;

        assert!(store.mark_consumed_by_spoke("e1", "s1").await.unwrap());
        assert!(store.mark_success("e1").await.unwrap());

        let published = store.read("e1").await.unwrap();
        assert_eq!(published.status, PublicationStatus::Success);
        assert_eq!(published.consumed_by_spoke.as_deref(), Some("s1"));
    }
}
