//! Serialize/deserialize between [`Payload`] and tagged JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::value::{ErrorValue, Payload};

const TAG_DATE: &str = "Date";
const TAG_ERROR: &str = "Error";
const TAG_MAP: &str = "Map";
const TAG_SET: &str = "Set";

/// Failure while decoding a tagged representation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    /// A tagged value did not have the shape its tag requires.
    #[error("malformed {tag} value: {reason}")]
    Malformed {
        /// The tag whose decoder rejected the value.
        tag: &'static str,
        /// What was wrong with the value.
        reason: String,
    },
}

/// A value codec with its tag and value attribute names fixed at
/// construction.
///
/// Serialization emits non-primitive types as `{<tag attr>: <tag>,
/// <value attr>: <linearized>}`; everything else is passed through
/// structurally. Deserialization inspects the tag attribute and recurses
/// structurally when it names no known tag.
///
/// Known ambiguity, carried over from the storage format: a keyed
/// structure whose tag attribute happens to hold a known tag name is
/// indistinguishable from the tagged type and will decode as one.
#[derive(Debug, Clone)]
pub struct Codec {
    type_attribute: String,
    value_attribute: String,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new("$type", "$value")
    }
}

impl Codec {
    /// Builds a codec with custom tag and value attribute names.
    #[must_use]
    pub fn new(type_attribute: impl Into<String>, value_attribute: impl Into<String>) -> Self {
        Self {
            type_attribute: type_attribute.into(),
            value_attribute: value_attribute.into(),
        }
    }

    fn tagged(&self, tag: &str, value: serde_json::Value) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(self.type_attribute.clone(), serde_json::Value::String(tag.to_owned()));
        map.insert(self.value_attribute.clone(), value);
        serde_json::Value::Object(map)
    }

    /// Serializes a value into its storage representation.
    #[must_use]
    pub fn serialize(&self, input: &Payload) -> serde_json::Value {
        match input {
            Payload::Null => serde_json::Value::Null,
            Payload::Bool(value) => serde_json::Value::Bool(*value),
            Payload::Number(value) => serde_json::Value::Number(value.clone()),
            Payload::Text(value) => serde_json::Value::String(value.clone()),
            Payload::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(|item| self.serialize(item)).collect())
            }
            Payload::Keyed(entries) => {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.serialize(value));
                }
                serde_json::Value::Object(map)
            }
            Payload::Date(date) => self.tagged(
                TAG_DATE,
                serde_json::Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
            Payload::Error(error) => self.tagged(TAG_ERROR, self.serialize_error(error)),
            Payload::Map(pairs) => self.tagged(
                TAG_MAP,
                serde_json::Value::Array(
                    pairs
                        .iter()
                        .map(|(key, value)| {
                            serde_json::Value::Array(vec![
                                self.serialize(key),
                                self.serialize(value),
                            ])
                        })
                        .collect(),
                ),
            ),
            Payload::Set(members) => self.tagged(
                TAG_SET,
                serde_json::Value::Array(
                    members.iter().map(|member| self.serialize(member)).collect(),
                ),
            ),
        }
    }

    fn serialize_error(&self, error: &ErrorValue) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("name".to_owned(), serde_json::Value::String(error.name.clone()));
        map.insert(
            "message".to_owned(),
            serde_json::Value::String(error.message.clone()),
        );
        for (key, value) in &error.properties {
            map.insert(key.clone(), self.serialize(value));
        }
        serde_json::Value::Object(map)
    }

    /// Deserializes a storage representation back into a value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` when a recognized tag carries a
    /// value of the wrong shape.
    pub fn deserialize(&self, input: &serde_json::Value) -> Result<Payload, CodecError> {
        match input {
            serde_json::Value::Null => Ok(Payload::Null),
            serde_json::Value::Bool(value) => Ok(Payload::Bool(*value)),
            serde_json::Value::Number(value) => Ok(Payload::Number(value.clone())),
            serde_json::Value::String(value) => Ok(Payload::Text(value.clone())),
            serde_json::Value::Array(items) => Ok(Payload::Sequence(
                items
                    .iter()
                    .map(|item| self.deserialize(item))
                    .collect::<Result<_, _>>()?,
            )),
            serde_json::Value::Object(map) => self.deserialize_object(map),
        }
    }

    fn deserialize_object(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Payload, CodecError> {
        if let Some(serde_json::Value::String(tag)) = map.get(&self.type_attribute) {
            match tag.as_str() {
                TAG_DATE => return self.deserialize_date(map),
                TAG_ERROR => return self.deserialize_error(map),
                TAG_MAP => return self.deserialize_map(map),
                TAG_SET => return self.deserialize_set(map),
                _ => {}
            }
        }

        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            entries.push((key.clone(), self.deserialize(value)?));
        }
        Ok(Payload::Keyed(entries))
    }

    fn tagged_value<'a>(
        &self,
        map: &'a serde_json::Map<String, serde_json::Value>,
        tag: &'static str,
    ) -> Result<&'a serde_json::Value, CodecError> {
        map.get(&self.value_attribute).ok_or_else(|| CodecError::Malformed {
            tag,
            reason: format!("missing {} attribute", self.value_attribute),
        })
    }

    fn deserialize_date(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Payload, CodecError> {
        let value = self.tagged_value(map, TAG_DATE)?;
        let raw = value.as_str().ok_or_else(|| CodecError::Malformed {
            tag: TAG_DATE,
            reason: "expected an ISO-8601 string".to_owned(),
        })?;
        let date = DateTime::parse_from_rfc3339(raw).map_err(|e| CodecError::Malformed {
            tag: TAG_DATE,
            reason: e.to_string(),
        })?;
        Ok(Payload::Date(date.with_timezone(&Utc)))
    }

    fn deserialize_error(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Payload, CodecError> {
        let value = self.tagged_value(map, TAG_ERROR)?;
        let fields = value.as_object().ok_or_else(|| CodecError::Malformed {
            tag: TAG_ERROR,
            reason: "expected an object".to_owned(),
        })?;

        let mut error = ErrorValue::new("Error", "");
        for (key, value) in fields {
            match key.as_str() {
                "name" => {
                    error.name = value
                        .as_str()
                        .ok_or_else(|| CodecError::Malformed {
                            tag: TAG_ERROR,
                            reason: "name must be text".to_owned(),
                        })?
                        .to_owned();
                }
                "message" => {
                    error.message = value
                        .as_str()
                        .ok_or_else(|| CodecError::Malformed {
                            tag: TAG_ERROR,
                            reason: "message must be text".to_owned(),
                        })?
                        .to_owned();
                }
                _ => error.properties.push((key.clone(), self.deserialize(value)?)),
            }
        }
        Ok(Payload::Error(error))
    }

    fn deserialize_map(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Payload, CodecError> {
        let value = self.tagged_value(map, TAG_MAP)?;
        let entries = value.as_array().ok_or_else(|| CodecError::Malformed {
            tag: TAG_MAP,
            reason: "expected a sequence of entry pairs".to_owned(),
        })?;

        let mut pairs = Vec::with_capacity(entries.len());
        for entry in entries {
            let pair = entry.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                CodecError::Malformed {
                    tag: TAG_MAP,
                    reason: "each entry must be a [key, value] pair".to_owned(),
                }
            })?;
            pairs.push((self.deserialize(&pair[0])?, self.deserialize(&pair[1])?));
        }
        Ok(Payload::Map(pairs))
    }

    fn deserialize_set(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Payload, CodecError> {
        let value = self.tagged_value(map, TAG_SET)?;
        let members = value.as_array().ok_or_else(|| CodecError::Malformed {
            tag: TAG_SET,
            reason: "expected a sequence of members".to_owned(),
        })?;
        Ok(Payload::Set(
            members
                .iter()
                .map(|member| self.deserialize(member))
                .collect::<Result<_, _>>()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Codec, CodecError};
    use crate::value::{ErrorValue, Payload};

    fn round_trip(codec: &Codec, value: &Payload) {
        let serialized = codec.serialize(value);
        let restored = codec.deserialize(&serialized).unwrap();
        assert_eq!(&restored, value);
    }

    #[test]
    fn test_scalars_pass_through_unchanged() {
        let codec = Codec::default();
        for value in [
            Payload::Null,
            Payload::from(true),
            Payload::from(42),
            Payload::from("plain text"),
        ] {
            assert_eq!(codec.serialize(&value), {
                // scalars serialize to their literal JSON form
                match &value {
                    Payload::Null => serde_json::Value::Null,
                    Payload::Bool(b) => serde_json::json!(b),
                    Payload::Number(n) => serde_json::Value::Number(n.clone()),
                    Payload::Text(t) => serde_json::json!(t),
                    other => panic!("unexpected {other:?}"),
                }
            });
            round_trip(&codec, &value);
        }
    }

    #[test]
    fn test_date_serializes_to_tagged_iso_string() {
        let codec = Codec::default();
        let date = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
            + chrono::Duration::milliseconds(678);
        let serialized = codec.serialize(&Payload::Date(date));
        assert_eq!(
            serialized,
            serde_json::json!({"$type": "Date", "$value": "2026-01-15T10:00:00.678Z"})
        );
        round_trip(&codec, &Payload::Date(date));
    }

    #[test]
    fn test_error_round_trips_with_extra_properties() {
        let codec = Codec::default();
        let error = Payload::Error(
            ErrorValue::new("TypeError", "boom")
                .with_property("code", Payload::from("E_BOOM"))
                .with_property(
                    "occurred_at",
                    Payload::Date(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()),
                ),
        );
        round_trip(&codec, &error);
    }

    #[test]
    fn test_map_round_trips_with_non_text_keys_in_order() {
        let codec = Codec::default();
        let map = Payload::Map(vec![
            (Payload::from("first"), Payload::from(1)),
            (
                Payload::Date(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()),
                Payload::from("dated"),
            ),
            (Payload::from(2), Payload::Null),
        ]);
        round_trip(&codec, &map);
    }

    #[test]
    fn test_set_round_trips_in_order() {
        let codec = Codec::default();
        let set = Payload::Set(vec![
            Payload::from("a"),
            Payload::from("b"),
            Payload::from(3),
        ]);
        round_trip(&codec, &set);
    }

    #[test]
    fn test_nested_combination_round_trips() {
        let codec = Codec::default();
        let date = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let value = Payload::Keyed(vec![
            ("label".to_owned(), Payload::from("outer")),
            (
                "timestamps".to_owned(),
                Payload::Map(vec![
                    (Payload::from("started"), Payload::Date(date)),
                    (
                        Payload::from("finished"),
                        Payload::Date(date + chrono::Duration::seconds(90)),
                    ),
                ]),
            ),
            (
                "attempts".to_owned(),
                Payload::Sequence(vec![
                    Payload::Set(vec![Payload::from("h1"), Payload::from("h2")]),
                    Payload::Error(ErrorValue::new("Error", "first attempt failed")),
                    Payload::Null,
                ]),
            ),
        ]);
        round_trip(&codec, &value);
    }

    #[test]
    fn test_keyed_structure_preserves_key_order() {
        let codec = Codec::default();
        let value = Payload::Keyed(vec![
            ("zulu".to_owned(), Payload::from(1)),
            ("alpha".to_owned(), Payload::from(2)),
            ("mike".to_owned(), Payload::from(3)),
        ]);
        let serialized = codec.serialize(&value);
        let keys: Vec<&String> = serialized.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zulu", "alpha", "mike"]);
        round_trip(&codec, &value);
    }

    #[test]
    fn test_unknown_tag_falls_through_to_keyed() {
        let codec = Codec::default();
        let input = serde_json::json!({"$type": "Custom", "$value": 7});
        let restored = codec.deserialize(&input).unwrap();
        assert_eq!(
            restored,
            Payload::Keyed(vec![
                ("$type".to_owned(), Payload::from("Custom")),
                ("$value".to_owned(), Payload::from(7)),
            ])
        );
    }

    #[test]
    fn test_tag_collision_decodes_as_tagged_type() {
        // A plain keyed structure that happens to carry the tag
        // attribute is indistinguishable from the tagged form.
        let codec = Codec::default();
        let input = serde_json::json!({"$type": "Date", "$value": "2026-01-15T10:00:00.000Z"});
        let restored = codec.deserialize(&input).unwrap();
        assert_eq!(
            restored,
            Payload::Date(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_malformed_tagged_values_are_rejected() {
        let codec = Codec::default();
        for input in [
            serde_json::json!({"$type": "Date", "$value": "not a date"}),
            serde_json::json!({"$type": "Date"}),
            serde_json::json!({"$type": "Map", "$value": 5}),
            serde_json::json!({"$type": "Map", "$value": [[1, 2, 3]]}),
            serde_json::json!({"$type": "Set", "$value": {}}),
            serde_json::json!({"$type": "Error", "$value": "boom"}),
        ] {
            let result = codec.deserialize(&input);
            assert!(
                matches!(result, Err(CodecError::Malformed { .. })),
                "expected Malformed for {input}"
            );
        }
    }

    #[test]
    fn test_custom_attribute_names() {
        let codec = Codec::new("@kind", "@data");
        let date = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let serialized = codec.serialize(&Payload::Date(date));
        assert_eq!(
            serialized,
            serde_json::json!({"@kind": "Date", "@data": "2026-01-15T10:00:00.000Z"})
        );
        // The default attribute names are now ordinary keys.
        let default_codec = Codec::default();
        let tagged_elsewhere = default_codec
            .deserialize(&serialized)
            .unwrap();
        assert!(matches!(tagged_elsewhere, Payload::Keyed(_)));
        round_trip(&codec, &Payload::Date(date));
    }
}
