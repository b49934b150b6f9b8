use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::mapping::FieldAccessor;
use crate::schema::FieldSchema;
use crate::types::EventRecord;

/// Insert id field value requesting a fresh UUIDv4 per row.
pub const UUID_INSERT_ID_SENTINEL: &str = "%uuid%";

/// How the warehouse deduplication key of a row is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertIdStrategy {
    /// A random UUIDv4 for every mapped row.
    Generated,
    /// The string form of a payload entry or built-in attribute.
    Field(String),
}

impl InsertIdStrategy {
    /// Interprets the configured insert id field.
    pub fn from_config(insert_id_field: Option<&str>) -> Option<Self> {
        match insert_id_field {
            None | Some("") => None,
            Some(UUID_INSERT_ID_SENTINEL) => Some(InsertIdStrategy::Generated),
            Some(name) => Some(InsertIdStrategy::Field(name.to_owned())),
        }
    }
}

/// A row ready to be streamed into the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub insert_id: Option<String>,
    pub values: Map<String, Value>,
}

impl TableRow {
    /// Returns the row as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

#[derive(Debug)]
enum CompiledInsertId {
    Generated,
    Field {
        name: String,
        accessor: FieldAccessor,
    },
}

/// Accessors compiled against the first event a mapper sees.
#[derive(Debug)]
struct CompiledShape {
    signature: Vec<String>,
    accessors: Vec<FieldAccessor>,
    insert_id: Option<CompiledInsertId>,
    mismatch_logged: bool,
}

impl CompiledShape {
    fn compile(
        schema: &FieldSchema,
        insert_id: Option<&InsertIdStrategy>,
        sample: &EventRecord,
    ) -> SinkResult<Self> {
        let accessors = schema
            .fields()
            .iter()
            .map(|field| FieldAccessor::resolve(&field.name, sample))
            .collect::<SinkResult<Vec<_>>>()?;

        let insert_id = match insert_id {
            None => None,
            Some(InsertIdStrategy::Generated) => Some(CompiledInsertId::Generated),
            Some(InsertIdStrategy::Field(name)) => Some(CompiledInsertId::Field {
                name: name.clone(),
                accessor: FieldAccessor::resolve(name, sample)?,
            }),
        };

        debug!(
            fields = accessors.len(),
            payload = ?sample.payload.names(),
            "compiled field accessors"
        );

        Ok(Self {
            signature: sample.payload.names().to_vec(),
            accessors,
            insert_id,
            mismatch_logged: false,
        })
    }

    fn note_shape(&mut self, record: &EventRecord) {
        if self.mismatch_logged || record.payload.names() == self.signature.as_slice() {
            return;
        }

        self.mismatch_logged = true;
        debug!(
            compiled = ?self.signature,
            observed = ?record.payload.names(),
            "event payload shape differs from the compiled one, reusing compiled positions"
        );
    }
}

/// Translates events into warehouse rows following the table schema.
///
/// Accessors are compiled lazily on the first mapped event and never recompiled.
#[derive(Debug)]
pub struct RowMapper {
    schema: Arc<FieldSchema>,
    insert_id: Option<InsertIdStrategy>,
    compiled: Option<CompiledShape>,
}

impl RowMapper {
    pub fn new(schema: Arc<FieldSchema>, insert_id: Option<InsertIdStrategy>) -> Self {
        Self {
            schema,
            insert_id,
            compiled: None,
        }
    }

    /// Maps one event into a row.
    ///
    /// Every schema field is read in order. A null value for a required field fails the mapping,
    /// a null value for an optional field is left out of the row.
    pub fn map_row(&mut self, record: &EventRecord) -> SinkResult<TableRow> {
        let shape = match self.compiled.take() {
            Some(shape) => shape,
            None => CompiledShape::compile(&self.schema, self.insert_id.as_ref(), record)?,
        };
        let shape = self.compiled.insert(shape);
        shape.note_shape(record);

        let mut values = Map::with_capacity(shape.accessors.len());
        for (field, accessor) in self.schema.fields().iter().zip(&shape.accessors) {
            let cell = accessor.extract(record);
            if cell.is_null() {
                if field.is_required() {
                    bail!(
                        ErrorKind::MissingRequiredField,
                        "Required field has no value",
                        format!("field `{}` of event {}", field.name, record.event_id)
                    );
                }
                continue;
            }

            values.insert(field.name.clone(), cell.to_json());
        }

        let insert_id = match &shape.insert_id {
            None => None,
            Some(CompiledInsertId::Generated) => Some(Uuid::new_v4().to_string()),
            Some(CompiledInsertId::Field { name, accessor }) => {
                match accessor.extract(record).to_insert_id() {
                    Some(id) => Some(id),
                    None => bail!(
                        ErrorKind::MissingRequiredField,
                        "Insert id field has no value",
                        format!("field `{name}` of event {}", record.event_id)
                    ),
                }
            }
        };

        Ok(TableRow { insert_id, values })
    }

    /// Maps a whole batch, aborting on the first failing event.
    pub fn map_batch(&mut self, records: &[EventRecord]) -> SinkResult<Vec<TableRow>> {
        records.iter().map(|record| self.map_row(record)).collect()
    }
}
