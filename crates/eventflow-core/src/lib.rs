//! Eventflow Core — shared abstractions for the persistence layer.
//!
//! This crate defines the query executor boundary, the error taxonomy,
//! the entity records with their status state machines, and the clock
//! abstraction. It contains no statement engine code.

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod record;
pub mod status;
