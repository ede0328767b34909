//! The closed union of encodable values.

use chrono::{DateTime, Utc};

/// An in-memory value the codec can round-trip.
///
/// `Keyed`, `Map`, and `Set` keep their entries in insertion order;
/// structural equality of a round-tripped value depends on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer or float.
    Number(serde_json::Number),
    /// A text value.
    Text(String),
    /// An ordered sequence of values.
    Sequence(Vec<Payload>),
    /// A keyed structure with string keys, in insertion order.
    Keyed(Vec<(String, Payload)>),
    /// A point in time.
    Date(DateTime<Utc>),
    /// A structured error value.
    Error(ErrorValue),
    /// An ordered associative container with arbitrary keys.
    Map(Vec<(Payload, Payload)>),
    /// An ordered set of members.
    Set(Vec<Payload>),
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Payload {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// An error value: a name, a message, and any extra properties the
/// error object carried, each a full [`Payload`] in its own right.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    /// The error class name.
    pub name: String,
    /// Human-readable message.
    pub message: String,
    /// Extra properties (e.g. `code`, `cause`), in insertion order.
    pub properties: Vec<(String, Payload)>,
}

impl ErrorValue {
    /// Builds an error value with no extra properties.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            properties: Vec::new(),
        }
    }

    /// Attaches an extra property, preserving insertion order.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Payload) -> Self {
        self.properties.push((key.into(), value));
        self
    }
}
