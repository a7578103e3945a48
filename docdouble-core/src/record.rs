//! Records and the wire shapes that appear inside them.
//!
//! Records arrive pre-serialized as JSON objects. Besides scalars, nested
//! objects and arrays, a field may hold one of the tagged wire shapes:
//!
//! - **Pointer**: `{"__type": "Pointer", "className": "...", "objectId": "..."}`
//! - **Date**: `{"__type": "Date", "iso": "2026-01-01T00:00:00.000Z"}`
//! - **Relation**: an array of Pointers, managed through relation operators
//!
//! The helpers here recognize those shapes and convert timestamps between
//! their wire and in-memory forms.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored or in-flight record: field name to JSON value.
pub type Record = Map<String, Value>;

pub const OBJECT_ID: &str = "objectId";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const CLASS_NAME: &str = "className";
pub const TYPE_KEY: &str = "__type";
pub const OP_KEY: &str = "__op";

/// Fields owned by the engine that a client payload may not set.
pub const IDENTITY_FIELDS: [&str; 3] = [OBJECT_ID, CREATED_AT, UPDATED_AT];

/// A reference to a record of another (or the same) class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl Pointer {
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }

    /// Reads anything carrying a string `className` and `objectId`.
    ///
    /// This accepts tagged pointers as well as records that were already
    /// expanded by an include, which carry the same two keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        Some(Self {
            class_name: object.get(CLASS_NAME)?.as_str()?.to_string(),
            object_id: object.get(OBJECT_ID)?.as_str()?.to_string(),
        })
    }

    /// Encodes this pointer in its tagged wire form.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(TYPE_KEY.to_string(), Value::from("Pointer"));
        object.insert(CLASS_NAME.to_string(), Value::from(self.class_name.clone()));
        object.insert(OBJECT_ID.to_string(), Value::from(self.object_id.clone()));

        Value::Object(object)
    }
}

impl From<Pointer> for Value {
    fn from(pointer: Pointer) -> Self {
        pointer.to_value()
    }
}

fn type_tag(value: &Value) -> Option<&str> {
    value.as_object()?.get(TYPE_KEY)?.as_str()
}

/// Returns `true` for a tagged Pointer.
pub fn is_pointer(value: &Value) -> bool {
    type_tag(value) == Some("Pointer")
}

/// Returns `true` for a tagged Date carrying an `iso` string.
pub fn is_date(value: &Value) -> bool {
    type_tag(value) == Some("Date") && value.get("iso").is_some_and(Value::is_string)
}

/// Parses an ISO-8601 timestamp into an instant.
pub fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

/// Reads the instant held by a tagged Date.
pub fn date_instant(value: &Value) -> Option<DateTime<Utc>> {
    if !is_date(value) {
        return None;
    }

    value.get("iso").and_then(Value::as_str).and_then(parse_iso)
}

/// Formats an instant the way stored timestamps are written:
/// UTC with millisecond precision and a `Z` suffix.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encodes an instant as a tagged Date.
pub fn date_value(instant: DateTime<Utc>) -> Value {
    let mut object = Map::new();
    object.insert(TYPE_KEY.to_string(), Value::from("Date"));
    object.insert("iso".to_string(), Value::from(format_timestamp(instant)));

    Value::Object(object)
}

/// Loose truthiness as the hosted service evaluates it for `$exists` and
/// array initialization: absent, `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Returns the `objectId` carried by a pointer or record, if any.
pub fn object_id_of(value: &Value) -> Option<&str> {
    value.as_object()?.get(OBJECT_ID)?.as_str()
}

/// Converts a payload into a record, rejecting anything that is not an object.
pub fn record_from_value(value: Value) -> crate::error::StoreResult<Record> {
    match value {
        Value::Object(record) => Ok(record),
        Value::Null => Ok(Record::new()),
        other => Err(crate::error::StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
