use crate::schema::{FieldDescriptor, FieldMode, FieldSchema, FieldType};

/// Schema file contents matching [`message_schema`].
pub const MESSAGE_SCHEMA_JSON: &str = r#"[{"name": "msg", "type": "STRING", "mode": "REQUIRED"}]"#;

/// Schema with a single required `msg` string column.
pub fn message_schema() -> FieldSchema {
    let fields = vec![FieldDescriptor::new(
        "msg",
        FieldType::String,
        FieldMode::Required,
    )];

    match FieldSchema::new(fields) {
        Ok(schema) => schema,
        Err(err) => panic!("message schema is invalid: {err}"),
    }
}
