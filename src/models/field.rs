//! Attribute values held by a [`Model`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::record::Model;

/// Naive layouts the API uses for timestamps without an offset.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Layout timestamps are written back in, matching what the API sends.
const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The value of one record attribute.
///
/// Most attributes stay plain JSON. Timestamps are parsed when the record is
/// built, and relation attributes hold expanded records once they have been
/// fetched lazily.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Plain JSON value as returned by the API.
    Value(Value),
    /// A `*_at` or `date` attribute parsed into UTC.
    Timestamp(DateTime<Utc>),
    /// An expanded related record.
    Record(Box<Model>),
    /// A list of expanded related records.
    Records(Vec<Model>),
}

impl Field {
    /// Build a field from API JSON, parsing timestamps for `*_at` and `date`
    /// attributes. Strings that do not parse are kept as they are.
    pub(crate) fn from_api(name: &str, value: Value) -> Self {
        if is_timestamp_attribute(name) {
            if let Some(ts) = value.as_str().and_then(parse_timestamp) {
                return Field::Timestamp(ts);
            }
        }
        Field::Value(value)
    }

    /// JSON sent back to the API.
    ///
    /// Expanded relations collapse to their ids. Timestamps use the API's
    /// own `YYYY-MM-DD HH:MM:SS` layout in UTC.
    pub fn to_json(&self) -> Value {
        match self {
            Field::Value(value) => value.clone(),
            Field::Timestamp(ts) => Value::String(ts.format(WIRE_TIMESTAMP_FORMAT).to_string()),
            Field::Record(model) => model.id_value().cloned().unwrap_or(Value::Null),
            Field::Records(models) => Value::Array(
                models
                    .iter()
                    .map(|m| m.id_value().cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }

    /// The plain JSON value, if this field is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Shortcut for string values.
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Shortcut for integer values.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Field::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Model> {
        match self {
            Field::Record(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Model]> {
        match self {
            Field::Records(models) => Some(models),
            _ => None,
        }
    }

    /// Whether the field holds a list, expanded or not.
    pub(crate) fn is_list(&self) -> bool {
        matches!(self, Field::Records(_) | Field::Value(Value::Array(_)))
    }

    /// An integer or a non-empty list of integers standing in for related
    /// records that have not been expanded yet.
    pub(crate) fn is_foreign_id(&self) -> bool {
        match self {
            Field::Value(Value::Number(n)) => n.is_i64() || n.is_u64(),
            Field::Value(Value::Array(items)) => {
                !items.is_empty()
                    && items
                        .iter()
                        .all(|item| matches!(item, Value::Number(n) if n.is_i64() || n.is_u64()))
            }
            _ => false,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<DateTime<Utc>> for Field {
    fn from(value: DateTime<Utc>) -> Self {
        Field::Timestamp(value)
    }
}

impl From<Model> for Field {
    fn from(value: Model) -> Self {
        Field::Record(Box::new(value))
    }
}

impl From<Vec<Model>> for Field {
    fn from(value: Vec<Model>) -> Self {
        Field::Records(value)
    }
}

fn is_timestamp_attribute(name: &str) -> bool {
    name == "date" || name.ends_with("_at")
}

/// Parse the timestamp layouts the API emits.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
