//! Log archive — operational log records and dated partitions.

use std::sync::Arc;

use chrono::NaiveDate;
use eventflow_codec::{Codec, Payload};
use eventflow_core::clock::{Clock, SystemClock};
use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{Params, QueryExecutor};

const TABLE: Table = Table::Log;

mod ops {
    pub const PERSIST: &str = "log/persist";
    pub const ARCHIVE: &str = "log/archive";
}

/// An operational log record to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    /// The component or process that produced the record.
    pub agent: String,
    /// Human-readable message.
    pub message: String,
    /// The error that was logged, if any; stored codec-encoded.
    pub error: Option<Payload>,
}

/// Appends log records and rolls them into dated partitions.
#[derive(Clone)]
pub struct LogStore {
    executor: Arc<dyn QueryExecutor>,
    clock: Arc<dyn Clock>,
    codec: Codec,
}

impl LogStore {
    /// Creates a store over the given executor with the system clock.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>, codec: Codec) -> Self {
        Self::with_clock(executor, codec, Arc::new(SystemClock))
    }

    /// Creates a store with an explicit clock (archiving defaults to
    /// the clock's current date).
    #[must_use]
    pub fn with_clock(
        executor: Arc<dyn QueryExecutor>,
        codec: Codec,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor,
            clock,
            codec,
        }
    }

    /// Appends a log record. The error field is serialized through the
    /// codec, or stored as an empty object when absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` when the write fails.
    pub async fn persist(&self, entry: NewLogEntry) -> Result<(), StoreError> {
        let error = entry
            .error
            .as_ref()
            .map_or_else(|| serde_json::json!({}), |payload| self.codec.serialize(payload));
        let params = Params::named([
            ("agent", serde_json::json!(entry.agent)),
            ("message", serde_json::json!(entry.message)),
            ("error", error),
        ]);
        self.executor
            .execute(ops::PERSIST, params)
            .await
            .map_err(|cause| StoreError::Persist { table: TABLE, cause })?;
        Ok(())
    }

    /// Rolls the given date's log rows into the `YYYYMMDD` partition,
    /// defaulting to the clock's current date.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Update` when the partition move fails.
    pub async fn archive(&self, date: Option<NaiveDate>) -> Result<(), StoreError> {
        let date = date.unwrap_or_else(|| self.clock.now().date_naive());
        let partition = date.format("%Y%m%d").to_string();
        tracing::debug!(%partition, "archiving log");
        let params = Params::positional([
            serde_json::json!(partition),
            serde_json::json!(date.format("%Y-%m-%d").to_string()),
        ]);
        self.executor
            .execute(ops::ARCHIVE, params)
            .await
            .map_err(|cause| StoreError::Update { table: TABLE, cause })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use eventflow_codec::{Codec, ErrorValue, Payload};
    use eventflow_test_support::{FixedClock, InMemoryExecutor};

    use super::{LogStore, NewLogEntry};

    fn fixture() -> (Arc<InMemoryExecutor>, LogStore) {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let clock = Arc::new(FixedClock(now));
        let executor = Arc::new(InMemoryExecutor::with_clock(clock.clone()));
        let store = LogStore::with_clock(executor.clone(), Codec::default(), clock);
        (executor, store)
    }

    #[tokio::test]
    async fn test_persist_encodes_the_error_through_the_codec() {
        let (executor, store) = fixture();
        let error = Payload::Error(
            ErrorValue::new("Error", "delivery failed")
                .with_property("code", Payload::from("E_DELIVERY")),
        );

        store
            .persist(NewLogEntry {
                agent: "hub-h1".to_owned(),
                message: "publish attempt failed".to_owned(),
                error: Some(error),
            })
            .await
            .unwrap();

        let logs = executor.log_rows();
        assert_eq!(logs.len(), 1);
        let stored_error = logs[0].get("error").unwrap();
        assert_eq!(stored_error.get("$type").unwrap(), "Error");
        assert_eq!(
            Codec::default().deserialize(stored_error).unwrap(),
            Payload::Error(
                ErrorValue::new("Error", "delivery failed")
                    .with_property("code", Payload::from("E_DELIVERY"))
            )
        );
    }

    #[tokio::test]
    async fn test_persist_without_error_stores_an_empty_object() {
        let (executor, store) = fixture();

        store
            .persist(NewLogEntry {
                agent: "hub-h1".to_owned(),
                message: "hub online".to_owned(),
                error: None,
            })
            .await
            .unwrap();

        let logs = executor.log_rows();
        assert_eq!(logs[0].get("error").unwrap(), &serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_archive_defaults_to_the_clocks_current_date() {
        let (executor, store) = fixture();
        store
            .persist(NewLogEntry {
                agent: "hub-h1".to_owned(),
                message: "hub online".to_owned(),
                error: None,
            })
            .await
            .unwrap();

        store.archive(None).await.unwrap();

        assert!(executor.log_rows().is_empty());
        assert_eq!(executor.archived_log_rows("20260115").len(), 1);
    }

    #[tokio::test]
    async fn test_archive_with_explicit_date_only_moves_that_day() {
        let (executor, store) = fixture();
        store
            .persist(NewLogEntry {
                agent: "hub-h1".to_owned(),
                message: "hub online".to_owned(),
                error: None,
            })
            .await
            .unwrap();

        let other_day = chrono::NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        store.archive(Some(other_day)).await.unwrap();

        assert_eq!(executor.log_rows().len(), 1);
        assert!(executor.archived_log_rows("20260114").is_empty());
    }
}
