//! Time source behind row timestamps and event id generation.

use chrono::{DateTime, Utc};

/// Supplies the current instant to the stores.
///
/// Everything time-dependent — created-at stamps, event id prefixes,
/// certificate expiry checks, archive partition defaults — goes through
/// this trait so tests can pin the moment.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock; the default outside of tests.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
