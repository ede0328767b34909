//! Store error taxonomy.

use std::fmt;

use thiserror::Error;

use crate::executor::ExecutorError;

/// The logical table an operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// Credential material.
    Certificate,
    /// Domain events.
    Event,
    /// Event-to-correlation-id associations.
    EventCorrelation,
    /// Event-to-external-id associations.
    EventExternal,
    /// Publication lifecycle rows.
    EventPublished,
    /// Deferred execution rows.
    EventScheduled,
    /// Coordinator presence rows.
    Hub,
    /// Operational log rows.
    Log,
}

impl Table {
    /// Storage-level name of the table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::Event => "event",
            Self::EventCorrelation => "event_cpid",
            Self::EventExternal => "event_eid",
            Self::EventPublished => "event_published",
            Self::EventScheduled => "event_scheduled",
            Self::Hub => "hub",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for every store operation.
///
/// Every variant except `NotFound` and `IllegalTransition` wraps the
/// causal executor failure. `NotFound` is raised only after a
/// successful-but-empty read; boolean-returning mutations report zero
/// changed rows as a normal `false`, never through this type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live row matched the given id.
    #[error("{table} not found by id: {id}")]
    NotFound {
        /// The table that was read.
        table: Table,
        /// The id that matched nothing.
        id: String,
    },

    /// A write failed.
    #[error("could not persist {table}")]
    Persist {
        /// The table being written.
        table: Table,
        /// The causal executor failure.
        #[source]
        cause: ExecutorError,
    },

    /// A read failed.
    #[error("could not read {table}")]
    Read {
        /// The table being read.
        table: Table,
        /// The causal executor failure.
        #[source]
        cause: ExecutorError,
    },

    /// A status or field update failed.
    #[error("could not update {table}")]
    Update {
        /// The table being updated.
        table: Table,
        /// The causal executor failure.
        #[source]
        cause: ExecutorError,
    },

    /// A delete failed.
    #[error("could not delete from {table}")]
    Delete {
        /// The table being deleted from.
        table: Table,
        /// The causal executor failure.
        #[source]
        cause: ExecutorError,
    },

    /// Idempotent table creation failed.
    #[error("could not create table {table}")]
    SchemaSetup {
        /// The table being created.
        table: Table,
        /// The causal executor failure.
        #[source]
        cause: ExecutorError,
    },

    /// A status transition was rejected by the lifecycle state machine.
    #[error("illegal {table} transition from {from} to {to} for event: {event_id}")]
    IllegalTransition {
        /// The lifecycle table.
        table: Table,
        /// The event whose row was being advanced.
        event_id: String,
        /// The current status.
        from: &'static str,
        /// The requested status.
        to: &'static str,
    },
}
