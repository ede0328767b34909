//! A pinned `Clock` so generated ids, created-at stamps, and expiry
//! checks are reproducible in tests.

use chrono::{DateTime, Utc};
use eventflow_core::clock::Clock;

/// Always reports the instant it was constructed with.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
