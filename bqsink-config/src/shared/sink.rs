use std::path::PathBuf;

use serde::Deserialize;

use crate::shared::{
    AuthMethod, BufferingConfig, RetryConfig, ServiceAccountConfig, ValidationError,
};

/// Configuration of a BigQuery log sink.
///
/// `table_id` may embed one `{pattern}` time span which is expanded with the current UTC time,
/// e.g. `access_log_{%Y%m%d}` or `access_log_{yyyyMMdd}`.
///
/// This intentionally does not implement [`serde::Serialize`] because it carries credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    /// Google Cloud project identifier.
    pub project_id: String,
    /// BigQuery dataset identifier.
    pub dataset_id: String,
    /// BigQuery table identifier or table template.
    pub table_id: String,
    /// Authentication method, only `private_key` is supported.
    #[serde(default)]
    pub auth_method: AuthMethod,
    /// Service account used to authenticate with BigQuery.
    #[serde(default)]
    pub service_account: ServiceAccountConfig,
    /// Whether the destination table is created on first use when missing.
    #[serde(default)]
    pub auto_create_table: bool,
    /// Path to the JSON table schema file.
    #[serde(default)]
    pub table_schema_file: Option<PathBuf>,
    /// Field whose value is used as insert id, or `%uuid%` to generate one per row.
    #[serde(default)]
    pub insert_id_field: Option<String>,
    #[serde(default)]
    pub buffering: BufferingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SinkConfig {
    /// Validates the whole sink configuration, stopping at the first error.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("project_id", &self.project_id),
            ("dataset_id", &self.dataset_id),
            ("table_id", &self.table_id),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::missing(field));
            }
        }

        self.service_account.validate()?;

        match &self.table_schema_file {
            Some(path) if !path.as_os_str().is_empty() => {}
            _ => return Err(ValidationError::missing("table_schema_file")),
        }

        if self.insert_id_field.as_deref() == Some("") {
            return Err(ValidationError::invalid(
                "insert_id_field",
                "must not be empty when set",
            ));
        }

        self.buffering.validate()?;
        self.retry.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn parse(value: serde_json::Value) -> SinkConfig {
        serde_json::from_value(value).unwrap()
    }

    fn minimal() -> serde_json::Value {
        serde_json::json!({
            "project_id": "project",
            "dataset_id": "logs",
            "table_id": "events_{%Y%m%d}",
            "service_account": {
                "email": "sink@project.iam.gserviceaccount.com",
                "private_key_file": "/secrets/key.json"
            },
            "table_schema_file": "/etc/bqsink/schema.json"
        })
    }

    #[test]
    fn applies_documented_defaults() {
        let config = parse(minimal());

        assert_eq!(config.auth_method, AuthMethod::PrivateKey);
        assert!(!config.auto_create_table);
        assert_eq!(config.insert_id_field, None);
        assert_eq!(config.buffering, BufferingConfig::default());
        assert_eq!(config.buffering.interval_ms, 30_000);
        assert_eq!(config.buffering.count, 200);
        assert_eq!(config.buffering.max_buffer_size, 30_000);
        assert_eq!(config.buffering.flush_timeout_ms, 60_000);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(
            config
                .service_account
                .private_key_passphrase
                .expose_secret(),
            "notasecret"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_identifiers() {
        let mut value = minimal();
        value["dataset_id"] = serde_json::json!("  ");

        assert_eq!(
            parse(value).validate(),
            Err(ValidationError::missing("dataset_id"))
        );
    }

    #[test]
    fn requires_schema_file() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("table_schema_file");

        assert_eq!(
            parse(value).validate(),
            Err(ValidationError::missing("table_schema_file"))
        );
    }

    #[test]
    fn requires_service_account() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("service_account");

        assert_eq!(
            parse(value).validate(),
            Err(ValidationError::missing("service_account.email"))
        );
    }

    #[test]
    fn rejects_unsupported_auth_method() {
        let mut value = minimal();
        value["auth_method"] = serde_json::json!("oauth");

        assert!(serde_json::from_value::<SinkConfig>(value).is_err());
    }

    #[test]
    fn rejects_zero_buffering_count() {
        let mut value = minimal();
        value["buffering"] = serde_json::json!({ "count": 0 });

        assert!(matches!(
            parse(value).validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "buffering.count"
        ));
    }
}
