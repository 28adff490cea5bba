//! Looking up the metastore database credentials.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use super::{config::MetastoreConfig, error::SetupError};

/// A store of secrets, addressed by scope and key.
pub trait SecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<String, failure::Error>;
}

/// Secrets from a JSON document of the form `{ "<scope>": { "<key>": "<value>" } }`.
#[derive(Debug, Default)]
pub struct FileSecretStore {
    scopes: BTreeMap<String, BTreeMap<String, String>>,
}

impl FileSecretStore {
    pub fn open<P: AsRef<Path>>(path: &P) -> Result<Self, failure::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, failure::Error> {
        Ok(FileSecretStore {
            scopes: serde_json::from_str(json)?,
        })
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<String, failure::Error> {
        self.scopes
            .get(scope)
            .and_then(|secrets| secrets.get(key))
            .cloned()
            .ok_or_else(|| {
                SetupError::SecretNotFound {
                    scope: scope.into(),
                    key: key.into(),
                }
                .into()
            })
    }
}

/// Secrets from environment variables named `METASTORE_SECRET_<SCOPE>_<KEY>`.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    /// The variable holding the given secret. Scope and key are upper-cased and anything that is
    /// not alphanumeric becomes `_`.
    pub fn var_name(scope: &str, key: &str) -> String {
        let sanitize = |s: &str| -> String {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect()
        };

        format!("METASTORE_SECRET_{}_{}", sanitize(scope), sanitize(key))
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<String, failure::Error> {
        let var = Self::var_name(scope, key);
        debug!("Reading secret {}/{} from ${}", scope, key, var);

        std::env::var(&var).map_err(|_| {
            SetupError::SecretNotFound {
                scope: scope.into(),
                key: key.into(),
            }
            .into()
        })
    }
}

/// The metastore database user and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Look up both credentials for `config`, one lookup per key.
    pub fn resolve(
        config: &MetastoreConfig,
        store: &dyn SecretStore,
    ) -> Result<Self, failure::Error> {
        Ok(Credentials {
            user: store.get(&config.secret_scope, &config.user_secret_key)?,
            password: store.get(&config.secret_scope, &config.password_secret_key)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}
