use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub content_cache_age_sec: Option<usize>,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: Option<usize>,

    // Sessions
    pub token_ttl_sec: Option<u64>,
    pub jwt_secret: Option<String>,

    /// Replaces the account given on the command line when present.
    pub accounts: Option<Vec<AccountConfig>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub username: String,
    /// Argon2 PHC string or hex SHA-256 digest, see `cli-auth hash`.
    pub secret_hash: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
