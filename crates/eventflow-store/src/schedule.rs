//! Schedule registry — deferred execution lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor};
use eventflow_core::record::ScheduledEvent;
use eventflow_core::status::ScheduleStatus;

const TABLE: Table = Table::EventScheduled;

mod ops {
    pub const PERSIST: &str = "event_scheduled/persist";
    pub const READ: &str = "event_scheduled/read";
    pub const READ_BY_EVENT_ID: &str = "event_scheduled/read-by-event-id";
    pub const UPDATE_EXECUTED: &str = "event_scheduled/update-executed";
    pub const UPDATE_SUCCESS: &str = "event_scheduled/update-success";
    pub const UPDATE_FAILED: &str = "event_scheduled/update-failed";
}

fn read_error(cause: ExecutorError) -> StoreError {
    StoreError::Read { table: TABLE, cause }
}

/// Records future execution times and advances execution status through
/// `Scheduled -> Executed -> {Success, Failed}`.
///
/// Transition handling mirrors the publication tracker: missing row and
/// re-applied status are `Ok(false)`, illegal pairs are rejected.
#[derive(Clone)]
pub struct ScheduleStore {
    executor: Arc<dyn QueryExecutor>,
}

impl ScheduleStore {
    /// Creates a store over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Records a deferred execution request at status `Scheduled`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` when the write fails.
    pub async fn persist(
        &self,
        event_id: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        tracing::debug!(%event_id, %scheduled_at, "scheduling event");
        let params = Params::named([
            ("event_id", serde_json::json!(event_id)),
            ("scheduled_at", serde_json::json!(scheduled_at.to_rfc3339())),
        ]);
        let outcome = self
            .executor
            .execute(ops::PERSIST, params)
            .await
            .map_err(|cause| StoreError::Persist { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Reads every schedule row regardless of status; callers filter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_all(&self) -> Result<Vec<ScheduledEvent>, StoreError> {
        let outcome = self
            .executor
            .execute(ops::READ, Params::None)
            .await
            .map_err(read_error)?;
        outcome
            .into_rows()
            .iter()
            .map(ScheduledEvent::from_row)
            .collect::<Result<_, _>>()
            .map_err(read_error)
    }

    /// Reads a schedule row by event id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when no row matches and
    /// `StoreError::Read` when the read itself fails.
    pub async fn read(&self, event_id: &str) -> Result<ScheduledEvent, StoreError> {
        self.read_optional(event_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table: TABLE,
                id: event_id.to_owned(),
            })
    }

    async fn read_optional(&self, event_id: &str) -> Result<Option<ScheduledEvent>, StoreError> {
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
            .map(|row| ScheduledEvent::from_row(row).map_err(read_error))
            .transpose()
    }

    async fn transition(
        &self,
        event_id: &str,
        target: ScheduleStatus,
        operation: &'static str,
    ) -> Result<bool, StoreError> {
        let Some(current) = self.read_optional(event_id).await? else {
            return Ok(false);
        };
        if current.status == target {
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
            .execute(operation, Params::positional([serde_json::json!(event_id)]))
            .await
            .map_err(|cause| StoreError::Update { table: TABLE, cause })?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Marks the event as picked up for execution; also stamps
    /// `executed_at`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` unless the row is
    /// `Scheduled`, `StoreError::Update` when the update fails.
    pub async fn mark_executed(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(event_id, ScheduleStatus::Executed, ops::UPDATE_EXECUTED)
            .await
    }

    /// Marks the execution as successful. Terminal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` unless the row is
    /// `Executed`, `StoreError::Update` when the update fails.
    pub async fn mark_success(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(event_id, ScheduleStatus::Success, ops::UPDATE_SUCCESS)
            .await
    }

    /// Marks the execution as failed. Terminal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IllegalTransition` unless the row is
    /// `Executed`, `StoreError::Update` when the update fails.
    pub async fn mark_failed(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(event_id, ScheduleStatus::Failed, ops::UPDATE_FAILED)
            .await
    }
}
