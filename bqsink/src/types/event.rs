use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::Cell;

/// Severity of an [`EventRecord`], ordered from most to least severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    LogAlways,
    Critical,
    Error,
    Warning,
    #[default]
    Informational,
    Verbose,
}

impl EventLevel {
    /// Returns the numeric level written to the warehouse.
    pub fn as_i64(self) -> i64 {
        match self {
            EventLevel::LogAlways => 0,
            EventLevel::Critical => 1,
            EventLevel::Error => 2,
            EventLevel::Warning => 3,
            EventLevel::Informational => 4,
            EventLevel::Verbose => 5,
        }
    }
}

/// Ordered name and value pairs of an event.
///
/// Names are unique within one payload. Positions are stable for events of the same shape, which
/// is what compiled field accessors rely on.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Payload {
    names: Vec<String>,
    values: Vec<Cell>,
}

impl Payload {
    /// Builds a payload from pairs, a later duplicate name replaces the earlier value.
    pub fn from_pairs<I, N, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<Cell>,
    {
        let mut payload = Payload::default();
        for (name, value) in pairs {
            payload.push(name.into(), value.into());
        }

        payload
    }

    fn push(&mut self, name: String, value: Cell) {
        match self.position(&name) {
            Some(index) => self.values[index] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    /// Returns the payload names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the value at `index`.
    pub fn value_at(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }

    /// Returns the position of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload::from_pairs(map)
    }
}

/// One structured unit of telemetry submitted by the producer.
///
/// Besides the payload an event carries built-in attributes describing where it came from. When
/// deserialized from JSON every attribute except `payload` is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EventRecord {
    pub event_id: i32,
    pub event_name: Option<String>,
    pub level: EventLevel,
    pub formatted_message: Option<String>,
    pub keywords: i64,
    pub keywords_description: Option<String>,
    pub task: i32,
    pub task_name: Option<String>,
    pub opcode: i32,
    pub opcode_name: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub process_id: i32,
    pub thread_id: i32,
    pub provider_id: Uuid,
    pub provider_name: Option<String>,
    pub version: i32,
    pub activity_id: Uuid,
    pub related_activity_id: Uuid,
    pub payload: Payload,
}

impl EventRecord {
    /// Creates an event with the given payload and the current time as timestamp.
    pub fn with_payload(payload: Payload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
            ..Default::default()
        }
    }
}
