//! Hub registry — coordinator presence tracking.

use std::sync::Arc;

use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor};
use eventflow_core::record::{Hub, NewHub};

const TABLE: Table = Table::Hub;

mod ops {
    pub const PERSIST: &str = "hub/persist";
    pub const READ_ONLINE: &str = "hub/read-online-hubs";
    pub const UPDATE_TO_QUIT: &str = "hub/update-to-quit";
    pub const READ_QUIT: &str = "hub/read-quit-hub";
}

fn read_error(cause: ExecutorError) -> StoreError {
    StoreError::Read { table: TABLE, cause }
}

/// Tracks which coordinator processes are online.
///
/// A hub is online while its quit time is unset; it is never deleted,
/// only marked quit. Re-announcing a hub replaces its connection
/// metadata.
#[derive(Clone)]
pub struct HubStore {
    executor: Arc<dyn QueryExecutor>,
}

impl HubStore {
    /// Creates a store over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Inserts or replaces a hub's connection metadata.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` when the write fails.
    pub async fn persist(&self, hub: NewHub) -> Result<bool, StoreError> {
        tracing::debug!(hub_id = %hub.id, "announcing hub");
        let params = Params::named([
            ("id", serde_json::json!(hub.id)),
            ("external_ip", serde_json::json!(hub.external_ip)),
            ("external_port", serde_json::json!(hub.external_port)),
            ("internal_ip", serde_json::json!(hub.internal_ip)),
            ("internal_port", serde_json::json!(hub.internal_port)),
        ]);
        let outcome = self
            .executor
            .execute(ops::PERSIST, params)
            .await
            .map_err(|cause| StoreError::Persist { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Reads every hub with no quit time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_online(&self) -> Result<Vec<Hub>, StoreError> {
        let outcome = self
            .executor
            .execute(ops::READ_ONLINE, Params::None)
            .await
            .map_err(read_error)?;
        outcome
            .into_rows()
            .iter()
            .map(Hub::from_row)
            .collect::<Result<_, _>>()
            .map_err(read_error)
    }

    /// Sets the hub's quit time. An already-quit hub is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Update` when the update fails.
    pub async fn mark_quit(&self, hub_id: &str) -> Result<bool, StoreError> {
        tracing::debug!(%hub_id, "marking hub quit");
        let outcome = self
            .executor
            .execute(
                ops::UPDATE_TO_QUIT,
                Params::positional([serde_json::json!(hub_id)]),
            )
            .await
            .map_err(|cause| StoreError::Update { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Whether the hub's quit time is set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn has_quit(&self, hub_id: &str) -> Result<bool, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_QUIT,
                Params::positional([serde_json::json!(hub_id)]),
            )
            .await
            .map_err(read_error)?;
        Ok(!outcome.into_rows().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eventflow_core::error::StoreError;
    use eventflow_core::record::NewHub;
    use eventflow_test_support::{FailingExecutor, InMemoryExecutor};

    use super::HubStore;

    fn hub(id: &str) -> NewHub {
        NewHub {
            id: id.to_owned(),
            external_ip: "127.0.0.1".to_owned(),
            external_port: 50001,
            internal_ip: "127.0.0.1".to_owned(),
            internal_port: 50001,
        }
    }

    #[tokio::test]
    async fn test_hub_lifecycle_online_then_quit() {
        let store = HubStore::new(Arc::new(InMemoryExecutor::default()));

        assert!(store.persist(hub("h1")).await.unwrap());
        let online = store.read_online().await.unwrap();
        assert!(online.iter().any(|h| h.id == "h1"));
        assert!(!store.has_quit("h1").await.unwrap());

        assert!(store.mark_quit("h1").await.unwrap());

        assert!(store.read_online().await.unwrap().is_empty());
        assert!(store.has_quit("h1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_quit_twice_reports_false() {
        let store = HubStore::new(Arc::new(InMemoryExecutor::default()));
        store.persist(hub("h1")).await.unwrap();

        assert!(store.mark_quit("h1").await.unwrap());
        assert!(!store.mark_quit("h1").await.unwrap());
    }

    #[tokio::test]
    async fn test_reannouncing_replaces_connection_metadata() {
        let store = HubStore::new(Arc::new(InMemoryExecutor::default()));
        store.persist(hub("h1")).await.unwrap();

        let mut updated = hub("h1");
        updated.external_port = 50002;
        store.persist(updated).await.unwrap();

        let online = store.read_online().await.unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].external_port, 50002);
    }

    #[tokio::test]
    async fn test_executor_failure_is_wrapped_with_the_failing_operation_kind() {
        let store = HubStore::new(Arc::new(FailingExecutor));

        assert!(matches!(
            store.persist(hub("h1")).await,
            Err(StoreError::Persist { .. })
        ));
        assert!(matches!(
            store.read_online().await,
            Err(StoreError::Read { .. })
        ));
        assert!(matches!(
            store.mark_quit("h1").await,
            Err(StoreError::Update { .. })
        ));
        assert!(matches!(
            store.has_quit("h1").await,
            Err(StoreError::Read { .. })
        ));
    }
}
