//! Schema setup — idempotent table creation.

use std::sync::Arc;

use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{Params, QueryExecutor};

/// Issues the idempotent `<table>/schema` operation per table.
///
/// `setup` creates the tables in a fixed order: certificate and hub
/// before event, so the later association tables can reference them.
#[derive(Clone)]
pub struct SchemaManager {
    executor: Arc<dyn QueryExecutor>,
}

impl SchemaManager {
    /// Creates a manager over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    async fn create(&self, table: Table) -> Result<(), StoreError> {
        let operation = format!("{table}/schema");
        self.executor
            .execute(&operation, Params::None)
            .await
            .map_err(|cause| StoreError::SchemaSetup { table, cause })?;
        Ok(())
    }

    /// Creates the certificate table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_certificate(&self) -> Result<(), StoreError> {
        self.create(Table::Certificate).await
    }

    /// Creates the hub table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_hub(&self) -> Result<(), StoreError> {
        self.create(Table::Hub).await
    }

    /// Creates the event table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_event(&self) -> Result<(), StoreError> {
        self.create(Table::Event).await
    }

    /// Creates the correlation association table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_event_cpid(&self) -> Result<(), StoreError> {
        self.create(Table::EventCorrelation).await
    }

    /// Creates the external association table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_event_eid(&self) -> Result<(), StoreError> {
        self.create(Table::EventExternal).await
    }

    /// Creates the publication table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_event_published(&self) -> Result<(), StoreError> {
        self.create(Table::EventPublished).await
    }

    /// Creates the schedule table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_event_scheduled(&self) -> Result<(), StoreError> {
        self.create(Table::EventScheduled).await
    }

    /// Creates the log table if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` when creation fails.
    pub async fn create_table_log(&self) -> Result<(), StoreError> {
        self.create(Table::Log).await
    }

    /// Creates every table in dependency order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaSetup` for the first table whose
    /// creation fails.
    pub async fn setup(&self) -> Result<(), StoreError> {
        tracing::debug!("setting up table schemas");
        self.create_table_certificate().await?;
        self.create_table_hub().await?;
        self.create_table_event().await?;
        self.create_table_event_cpid().await?;
        self.create_table_event_eid().await?;
        self.create_table_event_published().await?;
        self.create_table_event_scheduled().await?;
        self.create_table_log().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eventflow_core::error::StoreError;
    use eventflow_test_support::{FailingExecutor, InMemoryExecutor};

    use super::SchemaManager;

    #[tokio::test]
    async fn test_setup_creates_tables_in_dependency_order() {
        let executor = Arc::new(InMemoryExecutor::default());
        let manager = SchemaManager::new(executor.clone());

        manager.setup().await.unwrap();

        assert_eq!(
            executor.recorded_operations(),
            [
                "certificate/schema",
                "hub/schema",
                "event/schema",
                "event_cpid/schema",
                "event_eid/schema",
                "event_published/schema",
                "event_scheduled/schema",
                "log/schema",
            ]
        );
    }

    #[tokio::test]
    async fn test_setup_failure_names_the_first_table() {
        let manager = SchemaManager::new(Arc::new(FailingExecutor));

        match manager.setup().await {
            Err(StoreError::SchemaSetup { table, .. }) => {
                assert_eq!(table.to_string(), "certificate");
            }
            other => panic!("expected SchemaSetup, got {other:?}"),
        }
    }
}
