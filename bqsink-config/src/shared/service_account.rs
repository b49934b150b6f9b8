use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Placeholder passphrase used when none is configured.
pub const DEFAULT_PRIVATE_KEY_PASSPHRASE: &str = "notasecret";

/// Authentication method used to obtain BigQuery credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Service account identity authenticated by a private key file.
    #[default]
    PrivateKey,
}

/// Service account credentials for the BigQuery client.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking the
/// passphrase into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceAccountConfig {
    /// Service account identity, e.g. `sink@my-project.iam.gserviceaccount.com`.
    #[serde(default)]
    pub email: String,
    /// Path to the service account private key file.
    #[serde(default)]
    pub private_key_file: PathBuf,
    /// Passphrase protecting the private key file.
    #[serde(default = "default_private_key_passphrase")]
    pub private_key_passphrase: SecretString,
}

impl ServiceAccountConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::missing("service_account.email"));
        }

        if self.private_key_file.as_os_str().is_empty() {
            return Err(ValidationError::missing("service_account.private_key_file"));
        }

        Ok(())
    }
}

impl Default for ServiceAccountConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            private_key_file: PathBuf::new(),
            private_key_passphrase: default_private_key_passphrase(),
        }
    }
}

fn default_private_key_passphrase() -> SecretString {
    SecretString::from(DEFAULT_PRIVATE_KEY_PASSPHRASE.to_string())
}
