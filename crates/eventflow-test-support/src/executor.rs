//! Test executors — in-memory and always-failing `QueryExecutor`
//! implementations.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventflow_core::clock::{Clock, SystemClock};
use eventflow_core::executor::{ExecutorError, Params, QueryExecutor, QueryOutcome, Row};

fn query_error(operation: &str, message: &str) -> ExecutorError {
    ExecutorError::Query {
        operation: operation.to_owned(),
        message: message.to_owned(),
    }
}

fn duplicate(constraint: &str) -> ExecutorError {
    ExecutorError::DuplicateKey {
        constraint: constraint.to_owned(),
    }
}

fn positional(operation: &str, params: Params) -> Result<Vec<serde_json::Value>, ExecutorError> {
    match params {
        Params::None => Ok(Vec::new()),
        Params::Positional(values) => Ok(values),
        Params::Named(_) => Err(query_error(operation, "expected positional parameters")),
    }
}

fn named(operation: &str, params: Params) -> Result<Row, ExecutorError> {
    match params {
        Params::Named(row) => Ok(row),
        Params::None | Params::Positional(_) => {
            Err(query_error(operation, "expected named parameters"))
        }
    }
}

fn arg(operation: &str, values: &[serde_json::Value], index: usize) -> Result<String, ExecutorError> {
    values
        .get(index)
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| query_error(operation, &format!("missing parameter {index}")))
}

fn column<'a>(row: &'a Row, name: &str) -> &'a str {
    row.get(name).and_then(serde_json::Value::as_str).unwrap_or("")
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[derive(Default)]
struct State {
    operations: Vec<String>,
    events: Vec<Row>,
    event_cpid: Vec<Row>,
    event_eid: Vec<Row>,
    event_published: Vec<Row>,
    event_scheduled: Vec<Row>,
    hubs: Vec<Row>,
    certificates: Vec<Row>,
    logs: Vec<Row>,
    log_archive: BTreeMap<String, Vec<Row>>,
}

/// An in-memory `QueryExecutor` that interprets every operation the
/// stores issue, honoring the same uniqueness constraints and filters
/// the production schema declares. Rows are timestamped from the
/// injected clock, so tests with a [`FixedClock`] are fully
/// deterministic.
///
/// [`FixedClock`]: crate::FixedClock
pub struct InMemoryExecutor {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl Default for InMemoryExecutor {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryExecutor {
    /// Creates an executor whose row timestamps come from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State::default()),
        }
    }

    fn now_text(&self) -> String {
        self.clock.now().to_rfc3339()
    }

    /// Every operation name executed so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn recorded_operations(&self) -> Vec<String> {
        self.state.lock().unwrap().operations.clone()
    }

    /// A snapshot of the unarchived log rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn log_rows(&self) -> Vec<Row> {
        self.state.lock().unwrap().logs.clone()
    }

    /// A snapshot of the log rows archived under the given partition.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn archived_log_rows(&self, partition: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .log_archive
            .get(partition)
            .cloned()
            .unwrap_or_default()
    }

    fn event_operation(
        &self,
        state: &mut State,
        operation: &str,
        params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        match operation {
            "event/persist" => {
                let row = named(operation, params)?;
                let id = column(&row, "id").to_owned();
                if state.events.iter().any(|event| column(event, "id") == id) {
                    return Err(duplicate("event.PRIMARY"));
                }
                let mut stored = row;
                stored.insert("created_at".to_owned(), serde_json::json!(self.now_text()));
                state.events.push(stored);
                Ok(QueryOutcome::Affected(1))
            }
            "event/read-by-id" => {
                let values = positional(operation, params)?;
                let id = arg(operation, &values, 0)?;
                Ok(QueryOutcome::Rows(
                    state
                        .events
                        .iter()
                        .filter(|event| column(event, "id") == id)
                        .cloned()
                        .collect(),
                ))
            }
            "event/read-by-pid-domain" => {
                let values = positional(operation, params)?;
                let pid = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                Ok(QueryOutcome::Rows(
                    state
                        .events
                        .iter()
                        .filter(|event| {
                            column(event, "pid") == pid && column(event, "domain") == domain
                        })
                        .cloned()
                        .collect(),
                ))
            }
            "event/read-by-pid-domain-between-timestamps" => {
                let values = positional(operation, params)?;
                let pid = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                let min = parse_instant(&arg(operation, &values, 2)?)
                    .ok_or_else(|| query_error(operation, "invalid min timestamp"))?;
                let max = parse_instant(&arg(operation, &values, 3)?)
                    .ok_or_else(|| query_error(operation, "invalid max timestamp"))?;
                Ok(QueryOutcome::Rows(
                    state
                        .events
                        .iter()
                        .filter(|event| {
                            column(event, "pid") == pid
                                && column(event, "domain") == domain
                                && parse_instant(column(event, "created_at"))
                                    .is_some_and(|at| at >= min && at <= max)
                        })
                        .cloned()
                        .collect(),
                ))
            }
            "event/read-by-pid-domain-names" => {
                let values = positional(operation, params)?;
                let pid = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                let names: Vec<String> = values
                    .iter()
                    .skip(2)
                    .filter_map(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect();
                Ok(QueryOutcome::Rows(
                    state
                        .events
                        .iter()
                        .filter(|event| {
                            column(event, "pid") == pid
                                && column(event, "domain") == domain
                                && names.iter().any(|name| name == column(event, "name"))
                        })
                        .cloned()
                        .collect(),
                ))
            }
            "event/read-distinct-pid-by-domain" => {
                let values = positional(operation, params)?;
                let domain = arg(operation, &values, 0)?;
                let mut seen = Vec::new();
                for event in &state.events {
                    let pid = column(event, "pid");
                    if column(event, "domain") == domain && !seen.iter().any(|s| s == pid) {
                        seen.push(pid.to_owned());
                    }
                }
                Ok(QueryOutcome::Rows(
                    seen.into_iter()
                        .map(|pid| {
                            let mut row = Row::new();
                            row.insert("pid".to_owned(), serde_json::json!(pid));
                            row
                        })
                        .collect(),
                ))
            }
            "event/delete-by-id" => {
                let values = positional(operation, params)?;
                let id = arg(operation, &values, 0)?;
                let before = state.events.len();
                state.events.retain(|event| column(event, "id") != id);
                Ok(QueryOutcome::Affected((before - state.events.len()) as u64))
            }
            "event/delete-by-pid-domain" => {
                let values = positional(operation, params)?;
                let pid = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                let before = state.events.len();
                state.events.retain(|event| {
                    !(column(event, "pid") == pid && column(event, "domain") == domain)
                });
                Ok(QueryOutcome::Affected((before - state.events.len()) as u64))
            }
            _ => Err(query_error(operation, "unknown operation")),
        }
    }

    fn association_operation(
        state: &mut State,
        operation: &str,
        params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        match operation {
            "event_cpid/persist" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                let cpid = arg(operation, &values, 2)?;
                let exists = state.event_cpid.iter().any(|row| {
                    column(row, "event_id") == event_id
                        && column(row, "domain") == domain
                        && column(row, "cpid") == cpid
                });
                if exists {
                    return Err(duplicate("event_cpid.unique"));
                }
                let mut row = Row::new();
                row.insert("event_id".to_owned(), serde_json::json!(event_id));
                row.insert("domain".to_owned(), serde_json::json!(domain));
                row.insert("cpid".to_owned(), serde_json::json!(cpid));
                state.event_cpid.push(row);
                Ok(QueryOutcome::Affected(1))
            }
            "event_cpid/delete" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                let cpid = arg(operation, &values, 2)?;
                let before = state.event_cpid.len();
                state.event_cpid.retain(|row| {
                    !(column(row, "event_id") == event_id
                        && column(row, "domain") == domain
                        && column(row, "cpid") == cpid)
                });
                Ok(QueryOutcome::Affected(
                    (before - state.event_cpid.len()) as u64,
                ))
            }
            "event_cpid/read-by-event_id" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                Ok(QueryOutcome::Rows(
                    state
                        .event_cpid
                        .iter()
                        .filter(|row| column(row, "event_id") == event_id)
                        .cloned()
                        .collect(),
                ))
            }
            "event_cpid/read-by-cpid-domain" => {
                let values = positional(operation, params)?;
                let cpid = arg(operation, &values, 0)?;
                let domain = arg(operation, &values, 1)?;
                let event_ids: Vec<String> = state
                    .event_cpid
                    .iter()
                    .filter(|row| {
                        column(row, "cpid") == cpid && column(row, "domain") == domain
                    })
                    .map(|row| column(row, "event_id").to_owned())
                    .collect();
                Ok(QueryOutcome::Rows(
                    state
                        .events
                        .iter()
                        .filter(|event| event_ids.iter().any(|id| id == column(event, "id")))
                        .cloned()
                        .collect(),
                ))
            }
            "event_eid/persist" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                let eid = arg(operation, &values, 1)?;
                let exists = state.event_eid.iter().any(|row| {
                    column(row, "event_id") == event_id && column(row, "eid") == eid
                });
                if exists {
                    return Err(duplicate("event_eid.unique"));
                }
                let mut row = Row::new();
                row.insert("event_id".to_owned(), serde_json::json!(event_id));
                row.insert("eid".to_owned(), serde_json::json!(eid));
                state.event_eid.push(row);
                Ok(QueryOutcome::Affected(1))
            }
            "event_eid/delete" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                let eid = arg(operation, &values, 1)?;
                let before = state.event_eid.len();
                state.event_eid.retain(|row| {
                    !(column(row, "event_id") == event_id && column(row, "eid") == eid)
                });
                Ok(QueryOutcome::Affected(
                    (before - state.event_eid.len()) as u64,
                ))
            }
            "event_eid/read-by-event_id" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                Ok(QueryOutcome::Rows(
                    state
                        .event_eid
                        .iter()
                        .filter(|row| column(row, "event_id") == event_id)
                        .cloned()
                        .collect(),
                ))
            }
            "event_eid/read-by-eid" | "event_eid/read-by-eid-domain" => {
                let values = positional(operation, params)?;
                let eid = arg(operation, &values, 0)?;
                let domain = if operation.ends_with("-domain") {
                    Some(arg(operation, &values, 1)?)
                } else {
                    None
                };
                let event_ids: Vec<String> = state
                    .event_eid
                    .iter()
                    .filter(|row| column(row, "eid") == eid)
                    .map(|row| column(row, "event_id").to_owned())
                    .collect();
                Ok(QueryOutcome::Rows(
                    state
                        .events
                        .iter()
                        .filter(|event| {
                            event_ids.iter().any(|id| id == column(event, "id"))
                                && domain
                                    .as_ref()
                                    .is_none_or(|d| d == column(event, "domain"))
                        })
                        .cloned()
                        .collect(),
                ))
            }
            _ => Err(query_error(operation, "unknown operation")),
        }
    }

    fn lifecycle_operation(
        &self,
        state: &mut State,
        operation: &str,
        params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        match operation {
            "event_published/persist" => {
                let row = named(operation, params)?;
                let event_id = column(&row, "event_id").to_owned();
                let exists = state
                    .event_published
                    .iter()
                    .any(|published| column(published, "event_id") == event_id);
                if exists {
                    return Err(duplicate("event_published.PRIMARY"));
                }
                let mut stored = row;
                stored.insert("consumed_by_hub".to_owned(), serde_json::Value::Null);
                stored.insert("consumed_by_spoke".to_owned(), serde_json::Value::Null);
                stored.insert("status".to_owned(), serde_json::json!("created"));
                state.event_published.push(stored);
                Ok(QueryOutcome::Affected(1))
            }
            "event_published/read-by-event-id" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                Ok(QueryOutcome::Rows(
                    state
                        .event_published
                        .iter()
                        .filter(|row| column(row, "event_id") == event_id)
                        .cloned()
                        .collect(),
                ))
            }
            "event_published/update-to-consumed-by-hub"
            | "event_published/update-to-consumed-by-spoke" => {
                let values = positional(operation, params)?;
                let consumer = arg(operation, &values, 0)?;
                let event_id = arg(operation, &values, 1)?;
                let (consumer_column, status) = if operation.ends_with("hub") {
                    ("consumed_by_hub", "consumed-by-hub")
                } else {
                    ("consumed_by_spoke", "consumed-by-spoke")
                };
                let mut affected = 0;
                for row in &mut state.event_published {
                    if column(row, "event_id") == event_id {
                        row.insert(consumer_column.to_owned(), serde_json::json!(consumer));
                        row.insert("status".to_owned(), serde_json::json!(status));
                        affected += 1;
                    }
                }
                Ok(QueryOutcome::Affected(affected))
            }
            "event_published/update-to-success"
            | "event_published/update-to-failed"
            | "event_published/update-to-orphan" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                let status = operation.rsplit('-').next().unwrap_or_default();
                let mut affected = 0;
                for row in &mut state.event_published {
                    if column(row, "event_id") == event_id {
                        row.insert("status".to_owned(), serde_json::json!(status));
                        affected += 1;
                    }
                }
                Ok(QueryOutcome::Affected(affected))
            }
            "event_scheduled/persist" => {
                let row = named(operation, params)?;
                let event_id = column(&row, "event_id").to_owned();
                let exists = state
                    .event_scheduled
                    .iter()
                    .any(|scheduled| column(scheduled, "event_id") == event_id);
                if exists {
                    return Err(duplicate("event_scheduled.PRIMARY"));
                }
                let mut stored = row;
                stored.insert("executed_at".to_owned(), serde_json::Value::Null);
                stored.insert("status".to_owned(), serde_json::json!("scheduled"));
                state.event_scheduled.push(stored);
                Ok(QueryOutcome::Affected(1))
            }
            "event_scheduled/read" => Ok(QueryOutcome::Rows(state.event_scheduled.clone())),
            "event_scheduled/read-by-event-id" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                Ok(QueryOutcome::Rows(
                    state
                        .event_scheduled
                        .iter()
                        .filter(|row| column(row, "event_id") == event_id)
                        .cloned()
                        .collect(),
                ))
            }
            "event_scheduled/update-executed"
            | "event_scheduled/update-success"
            | "event_scheduled/update-failed" => {
                let values = positional(operation, params)?;
                let event_id = arg(operation, &values, 0)?;
                let status = operation.rsplit('-').next().unwrap_or_default();
                let executed_at = self.now_text();
                let mut affected = 0;
                for row in &mut state.event_scheduled {
                    if column(row, "event_id") == event_id {
                        if status == "executed" {
                            row.insert("executed_at".to_owned(), serde_json::json!(executed_at));
                        }
                        row.insert("status".to_owned(), serde_json::json!(status));
                        affected += 1;
                    }
                }
                Ok(QueryOutcome::Affected(affected))
            }
            _ => Err(query_error(operation, "unknown operation")),
        }
    }

    fn presence_operation(
        &self,
        state: &mut State,
        operation: &str,
        params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        match operation {
            "hub/persist" => {
                let row = named(operation, params)?;
                let id = column(&row, "id").to_owned();
                let mut stored = row;
                stored.insert("quit_at".to_owned(), serde_json::Value::Null);
                state.hubs.retain(|hub| column(hub, "id") != id);
                state.hubs.push(stored);
                Ok(QueryOutcome::Affected(1))
            }
            "hub/read-online-hubs" => Ok(QueryOutcome::Rows(
                state
                    .hubs
                    .iter()
                    .filter(|hub| hub.get("quit_at") == Some(&serde_json::Value::Null))
                    .cloned()
                    .collect(),
            )),
            "hub/update-to-quit" => {
                let values = positional(operation, params)?;
                let id = arg(operation, &values, 0)?;
                let quit_at = self.now_text();
                let mut affected = 0;
                for hub in &mut state.hubs {
                    if column(hub, "id") == id
                        && hub.get("quit_at") == Some(&serde_json::Value::Null)
                    {
                        hub.insert("quit_at".to_owned(), serde_json::json!(quit_at));
                        affected += 1;
                    }
                }
                Ok(QueryOutcome::Affected(affected))
            }
            "hub/read-quit-hub" => {
                let values = positional(operation, params)?;
                let id = arg(operation, &values, 0)?;
                Ok(QueryOutcome::Rows(
                    state
                        .hubs
                        .iter()
                        .filter(|hub| {
                            column(hub, "id") == id
                                && hub.get("quit_at") != Some(&serde_json::Value::Null)
                        })
                        .cloned()
                        .collect(),
                ))
            }
            "certificate/persist" => {
                let row = named(operation, params)?;
                let id = column(&row, "id").to_owned();
                if state
                    .certificates
                    .iter()
                    .any(|certificate| column(certificate, "id") == id)
                {
                    return Err(duplicate("certificate.PRIMARY"));
                }
                let mut stored = row;
                stored.insert("revoked_at".to_owned(), serde_json::Value::Null);
                state.certificates.push(stored);
                Ok(QueryOutcome::Affected(1))
            }
            "certificate/read" => {
                let values = positional(operation, params)?;
                let id = arg(operation, &values, 0)?;
                let now = self.clock.now();
                Ok(QueryOutcome::Rows(
                    state
                        .certificates
                        .iter()
                        .filter(|certificate| {
                            column(certificate, "id") == id
                                && certificate.get("revoked_at")
                                    == Some(&serde_json::Value::Null)
                                && parse_instant(column(certificate, "validity"))
                                    .is_some_and(|validity| validity > now)
                        })
                        .cloned()
                        .collect(),
                ))
            }
            "certificate/revoke" => {
                let values = positional(operation, params)?;
                let id = arg(operation, &values, 0)?;
                let revoked_at = self.now_text();
                let mut affected = 0;
                for certificate in &mut state.certificates {
                    if column(certificate, "id") == id
                        && certificate.get("revoked_at") == Some(&serde_json::Value::Null)
                    {
                        certificate
                            .insert("revoked_at".to_owned(), serde_json::json!(revoked_at));
                        affected += 1;
                    }
                }
                Ok(QueryOutcome::Affected(affected))
            }
            "certificate/revoke-past-validity" => {
                let now = self.clock.now();
                let revoked_at = self.now_text();
                let mut affected = 0;
                for certificate in &mut state.certificates {
                    if certificate.get("revoked_at") == Some(&serde_json::Value::Null)
                        && parse_instant(column(certificate, "validity"))
                            .is_some_and(|validity| validity <= now)
                    {
                        certificate
                            .insert("revoked_at".to_owned(), serde_json::json!(revoked_at));
                        affected += 1;
                    }
                }
                Ok(QueryOutcome::Affected(affected))
            }
            _ => Err(query_error(operation, "unknown operation")),
        }
    }

    fn log_operation(
        &self,
        state: &mut State,
        operation: &str,
        params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        match operation {
            "log/persist" => {
                let mut row = named(operation, params)?;
                row.insert("logged_at".to_owned(), serde_json::json!(self.now_text()));
                state.logs.push(row);
                Ok(QueryOutcome::Affected(1))
            }
            "log/archive" => {
                let values = positional(operation, params)?;
                let partition = arg(operation, &values, 0)?;
                let date = arg(operation, &values, 1)?;
                let (matching, remaining): (Vec<Row>, Vec<Row>) = state
                    .logs
                    .drain(..)
                    .partition(|row| column(row, "logged_at").starts_with(&date));
                let moved = matching.len() as u64;
                state.logs = remaining;
                state
                    .log_archive
                    .entry(partition)
                    .or_default()
                    .extend(matching);
                Ok(QueryOutcome::Affected(moved))
            }
            _ => Err(query_error(operation, "unknown operation")),
        }
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn execute(
        &self,
        operation: &str,
        params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(operation.to_owned());

        if operation.ends_with("/schema") {
            return Ok(QueryOutcome::Affected(0));
        }

        match operation.split('/').next().unwrap_or_default() {
            "event" => self.event_operation(&mut state, operation, params),
            "event_cpid" | "event_eid" => {
                Self::association_operation(&mut state, operation, params)
            }
            "event_published" | "event_scheduled" => {
                self.lifecycle_operation(&mut state, operation, params)
            }
            "hub" | "certificate" => self.presence_operation(&mut state, operation, params),
            "log" => self.log_operation(&mut state, operation, params),
            _ => Err(query_error(operation, "unknown operation")),
        }
    }
}

/// A `QueryExecutor` that always fails. Useful for testing
/// error-wrapping paths.
#[derive(Debug, Clone, Copy)]
pub struct FailingExecutor;

#[async_trait]
impl QueryExecutor for FailingExecutor {
    async fn execute(
        &self,
        operation: &str,
        _params: Params,
    ) -> Result<QueryOutcome, ExecutorError> {
        Err(ExecutorError::Query {
            operation: operation.to_owned(),
            message: "connection refused".to_owned(),
        })
    }
}
