//! Shared test mocks and utilities for the Eventflow persistence layer.

mod clock;
mod executor;

pub use clock::FixedClock;
pub use executor::{FailingExecutor, InMemoryExecutor};
