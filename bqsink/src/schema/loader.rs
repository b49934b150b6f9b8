use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::schema::{FieldDescriptor, FieldType};
use crate::sink_error;

/// Ordered, immutable list of the destination table's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldDescriptor>,
}

impl FieldSchema {
    /// Builds a schema from already parsed fields, validating it.
    pub fn new(fields: Vec<FieldDescriptor>) -> SinkResult<Self> {
        validate_fields(&fields, "")?;

        Ok(Self { fields })
    }

    /// Reads and parses a schema file.
    pub async fn load(path: &Path) -> SinkResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
            sink_error!(
                ErrorKind::ConfigError,
                "Failed to read table schema file",
                format!("{}: {err}", path.display()),
                source: err
            )
        })?;

        let schema = Self::from_json_str(&contents)?;
        debug!(path = %path.display(), fields = schema.fields.len(), "loaded table schema");

        Ok(schema)
    }

    /// Parses a schema document.
    ///
    /// Accepts either a bare array of field objects, as written by `bq show --schema`, or an
    /// object with a `fields` array.
    pub fn from_json_str(contents: &str) -> SinkResult<Self> {
        let document: Value = serde_json::from_str(contents).map_err(|err| {
            sink_error!(
                ErrorKind::ConfigError,
                "Table schema is not valid JSON",
                err.to_string(),
                source: err
            )
        })?;

        let fields = match document {
            Value::Array(_) => document,
            Value::Object(mut object) => match object.remove("fields") {
                Some(fields) => fields,
                None => bail!(
                    ErrorKind::ConfigError,
                    "Table schema object has no `fields` entry"
                ),
            },
            _ => bail!(
                ErrorKind::ConfigError,
                "Table schema must be an array or an object with `fields`"
            ),
        };

        let fields: Vec<FieldDescriptor> = serde_json::from_value(fields).map_err(|err| {
            sink_error!(
                ErrorKind::ConfigError,
                "Table schema field is malformed",
                err.to_string(),
                source: err
            )
        })?;

        Self::new(fields)
    }

    /// Returns the top level fields in order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn validate_fields(fields: &[FieldDescriptor], parent: &str) -> SinkResult<()> {
    if fields.is_empty() {
        if parent.is_empty() {
            bail!(ErrorKind::ConfigError, "Table schema has no fields");
        }
        bail!(
            ErrorKind::ConfigError,
            "Record field has no nested fields",
            format!("field `{parent}`")
        );
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        let path = if parent.is_empty() {
            field.name.clone()
        } else {
            format!("{parent}.{}", field.name)
        };

        if field.name.trim().is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Table schema field has an empty name",
                format!("under `{}`", if parent.is_empty() { "<root>" } else { parent })
            );
        }

        // BigQuery column names are case-insensitive.
        if !seen.insert(field.name.to_ascii_lowercase()) {
            bail!(
                ErrorKind::ConfigError,
                "Table schema field name is duplicated",
                format!("field `{path}`")
            );
        }

        if field.field_type == FieldType::Record {
            validate_fields(&field.fields, &path)?;
        } else if !field.fields.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Only record fields may have nested fields",
                format!("field `{path}` has type {}", field.field_type)
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::schema::FieldMode;

    #[test]
    fn parses_bare_array() {
        let schema = FieldSchema::from_json_str(
            r#"[
                {"name": "msg", "type": "STRING", "mode": "REQUIRED"},
                {"name": "count", "type": "integer", "description": "how many"}
            ]"#,
        )
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.fields()[0].mode, FieldMode::Required);
        assert_eq!(schema.fields()[1].field_type, FieldType::Integer);
        assert_eq!(schema.fields()[1].description.as_deref(), Some("how many"));
    }

    #[test]
    fn parses_fields_object_with_nested_record() {
        let schema = FieldSchema::from_json_str(
            r#"{"fields": [
                {"name": "request", "type": "RECORD", "fields": [
                    {"name": "path", "type": "STRING"},
                    {"name": "status", "type": "INT64"}
                ]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(schema.fields()[0].fields.len(), 2);
    }

    #[test]
    fn rejects_empty_and_duplicate_names() {
        let empty = FieldSchema::from_json_str("[]").unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::ConfigError);

        let duplicated = FieldSchema::from_json_str(
            r#"[{"name": "msg", "type": "STRING"}, {"name": "MSG", "type": "STRING"}]"#,
        )
        .unwrap_err();
        assert_eq!(duplicated.description(), "Table schema field name is duplicated");

        let blank = FieldSchema::from_json_str(r#"[{"name": " ", "type": "STRING"}]"#).unwrap_err();
        assert_eq!(blank.description(), "Table schema field has an empty name");
    }

    #[test]
    fn rejects_record_without_fields() {
        let err =
            FieldSchema::from_json_str(r#"[{"name": "r", "type": "RECORD"}]"#).unwrap_err();
        assert_eq!(err.detail(), Some("field `r`"));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(FieldSchema::from_json_str("not json").is_err());
        assert!(FieldSchema::from_json_str(r#"{"columns": []}"#).is_err());
        assert!(FieldSchema::from_json_str(r#"[{"name": "x", "type": "VARCHAR"}]"#).is_err());
        assert!(FieldSchema::from_json_str("42").is_err());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "msg", "type": "STRING"}}]"#).unwrap();

        let schema = FieldSchema::load(file.path()).await.unwrap();
        assert_eq!(schema.fields()[0].name, "msg");

        let missing = FieldSchema::load(Path::new("/nonexistent/schema.json"))
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::ConfigError);
    }
}
