use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

/// Provider/route catalog configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Path of the JSON catalog document; omit for an in-memory catalog
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Secret the credential encryption key is derived from
    #[serde(default = "default_secret")]
    pub secret: SecretString,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            secret: default_secret(),
        }
    }
}

fn default_secret() -> SecretString {
    SecretString::from("change-me".to_owned())
}
