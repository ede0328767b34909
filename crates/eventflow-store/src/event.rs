//! Domain event store.

use std::sync::Arc;

use rand::Rng;

use chrono::{DateTime, Utc};
use eventflow_core::clock::{Clock, SystemClock};
use eventflow_core::error::{StoreError, Table};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor};
use eventflow_core::record::{Event, NewEvent};

const TABLE: Table = Table::Event;

mod ops {
    pub const PERSIST: &str = "event/persist";
    pub const READ_BY_ID: &str = "event/read-by-id";
    pub const READ_BY_PID_DOMAIN: &str = "event/read-by-pid-domain";
    pub const READ_BY_PID_DOMAIN_BETWEEN: &str = "event/read-by-pid-domain-between-timestamps";
    pub const READ_BY_PID_DOMAIN_NAMES: &str = "event/read-by-pid-domain-names";
    pub const READ_DISTINCT_PID_BY_DOMAIN: &str = "event/read-distinct-pid-by-domain";
    pub const DELETE_BY_ID: &str = "event/delete-by-id";
    pub const DELETE_BY_PID_DOMAIN: &str = "event/delete-by-pid-domain";
}

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 10;

fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ID_ALPHABET[usize::try_from(value % 36).unwrap_or(0)]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn persist_error(cause: ExecutorError) -> StoreError {
    StoreError::Persist { table: TABLE, cause }
}

fn read_error(cause: ExecutorError) -> StoreError {
    StoreError::Read { table: TABLE, cause }
}

fn delete_error(cause: ExecutorError) -> StoreError {
    StoreError::Delete { table: TABLE, cause }
}

fn decode_events(rows: Vec<eventflow_core::executor::Row>) -> Result<Vec<Event>, StoreError> {
    rows.iter()
        .map(Event::from_row)
        .collect::<Result<_, _>>()
        .map_err(read_error)
}

/// Create/read/delete access to the `event` table.
///
/// Events are immutable once persisted; the only mutations are the two
/// explicit delete operations. Payloads are stored opaque — encode them
/// with the codec before handing them over if they carry non-JSON types.
#[derive(Clone)]
pub struct EventStore {
    executor: Arc<dyn QueryExecutor>,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    /// Creates a store over the given executor with the system clock.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_clock(executor, Arc::new(SystemClock))
    }

    /// Creates a store with an explicit clock (id generation uses it).
    #[must_use]
    pub fn with_clock(executor: Arc<dyn QueryExecutor>, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    /// Generates an event id: the current millis in base 36, a dash,
    /// and a random base-36 suffix.
    fn generate_id(&self) -> String {
        let millis = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let mut rng = rand::rng();
        let mut id = base36(millis);
        id.push('-');
        for _ in 0..ID_SUFFIX_LEN {
            id.push(char::from(ID_ALPHABET[rng.random_range(0..36)]));
        }
        id
    }

    /// Persists an event, generating an id when the caller supplied
    /// none, and returns the id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` when the write fails; a failed
    /// write leaves no partial row behind.
    pub async fn persist(&self, event: NewEvent) -> Result<String, StoreError> {
        let id = event.id.unwrap_or_else(|| self.generate_id());
        tracing::debug!(event_id = %id, domain = %event.domain, "persisting event");
        let params = Params::named([
            ("id", serde_json::json!(id)),
            ("domain", serde_json::json!(event.domain)),
            ("pid", serde_json::json!(event.pid)),
            ("name", serde_json::json!(event.name)),
            ("data", event.data),
        ]);
        self.executor
            .execute(ops::PERSIST, params)
            .await
            .map_err(persist_error)?;
        Ok(id)
    }

    /// Reads a single event by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when no row matches and
    /// `StoreError::Read` when the read itself fails.
    pub async fn read(&self, id: &str) -> Result<Event, StoreError> {
        let outcome = self
            .executor
            .execute(ops::READ_BY_ID, Params::positional([serde_json::json!(id)]))
            .await
            .map_err(read_error)?;
        let rows = outcome.into_rows();
        let row = rows.first().ok_or_else(|| StoreError::NotFound {
            table: TABLE,
            id: id.to_owned(),
        })?;
        Event::from_row(row).map_err(read_error)
    }

    /// Reads all events for a domain and pid, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_by_domain_and_pid(
        &self,
        domain: &str,
        pid: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_BY_PID_DOMAIN,
                Params::positional([serde_json::json!(pid), serde_json::json!(domain)]),
            )
            .await
            .map_err(read_error)?;
        decode_events(outcome.into_rows())
    }

    /// Reads events for a domain and pid created within the closed
    /// `[min, max]` timestamp interval, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_by_domain_and_pid_between(
        &self,
        domain: &str,
        pid: &str,
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_BY_PID_DOMAIN_BETWEEN,
                Params::positional([
                    serde_json::json!(pid),
                    serde_json::json!(domain),
                    serde_json::json!(min.to_rfc3339()),
                    serde_json::json!(max.to_rfc3339()),
                ]),
            )
            .await
            .map_err(read_error)?;
        decode_events(outcome.into_rows())
    }

    /// Reads events for a domain and pid whose name is in `names`.
    ///
    /// Names are always bound parameters; an empty list short-circuits
    /// to an empty result without touching the executor.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_by_domain_and_pid_and_names(
        &self,
        domain: &str,
        pid: &str,
        names: &[&str],
    ) -> Result<Vec<Event>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = vec![serde_json::json!(pid), serde_json::json!(domain)];
        params.extend(names.iter().map(|name| serde_json::json!(name)));
        let outcome = self
            .executor
            .execute(ops::READ_BY_PID_DOMAIN_NAMES, Params::Positional(params))
            .await
            .map_err(read_error)?;
        decode_events(outcome.into_rows())
    }

    /// Reads the distinct pids observed for a domain.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` when the read fails.
    pub async fn read_distinct_pids_by_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<String>, StoreError> {
        let outcome = self
            .executor
            .execute(
                ops::READ_DISTINCT_PID_BY_DOMAIN,
                Params::positional([serde_json::json!(domain)]),
            )
            .await
            .map_err(read_error)?;
        outcome
            .into_rows()
            .iter()
            .map(|row| {
                row.get("pid")
                    .and_then(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| ExecutorError::Decode {
                        field: "pid".to_owned(),
                        message: "expected text".to_owned(),
                    })
            })
            .collect::<Result<_, _>>()
            .map_err(read_error)
    }

    /// Deletes an event by id. Zero matching rows is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Delete` when the delete fails.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        tracing::debug!(event_id = %id, "deleting event");
        let outcome = self
            .executor
            .execute(ops::DELETE_BY_ID, Params::positional([serde_json::json!(id)]))
            .await
            .map_err(delete_error)?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Deletes every event for a domain and pid. Zero matching rows is
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Delete` when the delete fails.
    pub async fn delete_by_domain_and_pid(
        &self,
        domain: &str,
        pid: &str,
    ) -> Result<bool, StoreError> {
        tracing::debug!(%domain, %pid, "deleting events");
        let outcome = self
            .executor
            .execute(
                ops::DELETE_BY_PID_DOMAIN,
                Params::positional([serde_json::json!(pid), serde_json::json!(domain)]),
            )
            .await
            .map_err(delete_error)?;
        Ok(outcome.rows_affected() > 0)
    }
}
