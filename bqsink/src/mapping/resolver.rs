use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::mapping::BuiltinAttribute;
use crate::types::{Cell, EventRecord};

/// Compiled strategy extracting one field's value from an [`EventRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccessor {
    /// Value at a fixed payload position.
    Payload(usize),
    /// One of the built-in record attributes.
    Builtin(BuiltinAttribute),
}

impl FieldAccessor {
    /// Resolves `field_name` against the shape of `sample`.
    ///
    /// Payload names win over built-in attributes, so a payload entry called `level` shadows the
    /// record's level.
    pub fn resolve(field_name: &str, sample: &EventRecord) -> SinkResult<Self> {
        if let Some(index) = sample.payload.position(field_name) {
            return Ok(FieldAccessor::Payload(index));
        }

        if let Some(attribute) = BuiltinAttribute::from_name(field_name) {
            return Ok(FieldAccessor::Builtin(attribute));
        }

        bail!(
            ErrorKind::UnknownField,
            "Field is neither a payload entry nor a built-in attribute",
            format!(
                "field `{field_name}` not found, payload has [{}]",
                sample.payload.names().join(", ")
            )
        );
    }

    /// Extracts the value from `record`.
    ///
    /// A payload position past the end of `record`'s payload yields [`Cell::Null`].
    pub fn extract(&self, record: &EventRecord) -> Cell {
        match self {
            FieldAccessor::Payload(index) => record
                .payload
                .value_at(*index)
                .cloned()
                .unwrap_or(Cell::Null),
            FieldAccessor::Builtin(attribute) => attribute.extract(record),
        }
    }
}
