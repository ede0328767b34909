//! Eventflow Store — the persistence layer of the event-sourcing platform.
//!
//! Every component here is a sibling over the same [`QueryExecutor`]:
//! the event store, the correlation and external-reference indices, the
//! publication and schedule lifecycle trackers, the hub registry, the
//! certificate vault, and the log archive. None of them calls another,
//! none holds mutable in-process state, and no operation spans multiple
//! statements atomically — composing calls is the caller's concern.
//!
//! [`QueryExecutor`]: eventflow_core::executor::QueryExecutor

pub mod certificate;
pub mod correlation;
pub mod event;
pub mod external;
pub mod hub;
pub mod log;
pub mod publication;
pub mod schedule;
pub mod schema;

pub use certificate::CertificateStore;
pub use correlation::CorrelationStore;
pub use event::EventStore;
pub use external::ExternalStore;
pub use hub::HubStore;
pub use log::{LogStore, NewLogEntry};
pub use publication::PublicationStore;
pub use schedule::ScheduleStore;
pub use schema::SchemaManager;
