use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A single value carried by an [`crate::types::EventRecord`].
///
/// Payload values coming from JSON input map onto the scalar variants, arrays and objects are
/// kept as [`Cell::Json`]. Built-in attributes produce typed timestamps and uuids.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Json(Value),
}

impl Cell {
    /// Returns `true` when the cell carries no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Renders the cell as the JSON value sent in a streaming insert row.
    ///
    /// Timestamps are rendered as RFC 3339 with microsecond precision, which BigQuery accepts
    /// for `TIMESTAMP` and `DATETIME` columns. Non finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(value) => Value::Bool(*value),
            Cell::I64(value) => Value::from(*value),
            Cell::F64(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::String(value) => Value::String(value.clone()),
            Cell::Timestamp(value) => {
                Value::String(value.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Cell::Uuid(value) => Value::String(value.hyphenated().to_string()),
            Cell::Json(value) => value.clone(),
        }
    }

    /// Returns the string form used when the cell is an insert id, or [`None`] for null.
    pub fn to_insert_id(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::String(value) => Some(value.clone()),
            other => match other.to_json() {
                Value::String(value) => Some(value),
                Value::Null => None,
                value => Some(value.to_string()),
            },
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(value) => Cell::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::I64(value),
                None => number.as_f64().map(Cell::F64).unwrap_or(Cell::Null),
            },
            Value::String(value) => Cell::String(value),
            value @ (Value::Array(_) | Value::Object(_)) => Cell::Json(value),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I64(value.into())
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn json_numbers_prefer_integers() {
        assert_eq!(Cell::from(json!(42)), Cell::I64(42));
        assert_eq!(Cell::from(json!(1.5)), Cell::F64(1.5));
        assert_eq!(Cell::from(json!(u64::MAX)), Cell::F64(u64::MAX as f64));
    }

    #[test]
    fn composite_json_is_kept_verbatim() {
        let value = json!({"a": [1, 2]});
        assert_eq!(Cell::from(value.clone()), Cell::Json(value));
    }

    #[test]
    fn timestamps_render_with_microseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            Cell::Timestamp(ts).to_json(),
            json!("2024-03-01T12:30:05.000000Z")
        );
    }

    #[test]
    fn insert_ids_use_plain_string_forms() {
        let id = Uuid::nil();
        assert_eq!(
            Cell::Uuid(id).to_insert_id().as_deref(),
            Some("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(Cell::I64(7).to_insert_id().as_deref(), Some("7"));
        assert_eq!(Cell::from("abc").to_insert_id().as_deref(), Some("abc"));
        assert_eq!(Cell::Null.to_insert_id(), None);
        assert_eq!(Cell::F64(f64::NAN).to_insert_id(), None);
    }
}
