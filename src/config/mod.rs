mod file_config;

pub use file_config::{AccountConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use crate::user::Account;
use anyhow::{bail, Result};
use clap::ValueEnum;
use rand::{distr::Alphanumeric, Rng};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_METRICS_PORT: u16 = 9091;
pub const DEFAULT_CONTENT_CACHE_AGE_SEC: usize = 3600;
pub const DEFAULT_TOKEN_TTL_SEC: u64 = 2 * 60 * 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

const EPHEMERAL_SECRET_LEN: usize = 64;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: usize,
    pub token_ttl_sec: u64,
    pub jwt_secret: Option<String>,
    pub admin_user: Option<String>,
    pub admin_secret_hash: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            logging_level: RequestsLoggingLevel::default(),
            content_cache_age_sec: DEFAULT_CONTENT_CACHE_AGE_SEC,
            frontend_dir_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            token_ttl_sec: DEFAULT_TOKEN_TTL_SEC,
            jwt_secret: None,
            admin_user: None,
            admin_secret_hash: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub data_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: usize,

    // Sessions
    pub token_ttl: Duration,
    pub jwt_secret: String,
    /// True when no secret was configured and a random one was generated.
    /// Tokens then stop verifying across restarts.
    pub jwt_secret_is_ephemeral: bool,

    pub accounts: Vec<Account>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        // A missing data_dir is created on startup, a file in its place is an error.
        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let content_cache_age_sec = file
            .content_cache_age_sec
            .unwrap_or(cli.content_cache_age_sec);
        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let max_upload_bytes = file.max_upload_bytes.unwrap_or(cli.max_upload_bytes);

        let token_ttl_sec = file.token_ttl_sec.unwrap_or(cli.token_ttl_sec);
        if token_ttl_sec == 0 {
            bail!("token_ttl_sec must be greater than zero");
        }

        let (jwt_secret, jwt_secret_is_ephemeral) =
            match file.jwt_secret.or_else(|| cli.jwt_secret.clone()) {
                Some(secret) if !secret.is_empty() => (secret, false),
                _ => {
                    warn!("No JWT secret configured, using a random one. Sessions will not survive a restart.");
                    (generate_secret(), true)
                }
            };

        let accounts = match file.accounts {
            Some(accounts) => accounts
                .into_iter()
                .map(|a| Account {
                    username: a.username,
                    secret_hash: a.secret_hash,
                })
                .collect(),
            None => match (&cli.admin_user, &cli.admin_secret_hash) {
                (Some(username), Some(secret_hash)) => vec![Account {
                    username: username.clone(),
                    secret_hash: secret_hash.clone(),
                }],
                (None, None) => vec![],
                _ => bail!("Both --admin-user and --admin-secret-hash must be provided together"),
            },
        };
        validate_accounts(&accounts)?;

        Ok(Self {
            data_dir,
            port,
            metrics_port,
            logging_level,
            content_cache_age_sec,
            frontend_dir_path,
            max_upload_bytes,
            token_ttl: Duration::from_secs(token_ttl_sec),
            jwt_secret,
            jwt_secret_is_ephemeral,
            accounts,
        })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.data_dir.join("settings")
    }
}

fn validate_accounts(accounts: &[Account]) -> Result<()> {
    if accounts.is_empty() {
        bail!("At least one account must be configured");
    }
    let mut seen = HashSet::new();
    for account in accounts {
        if account.username.is_empty() || account.secret_hash.is_empty() {
            bail!("Accounts need both a username and a secret_hash");
        }
        if !seen.insert(account.username.as_str()) {
            bail!("Duplicate account {}", account.username);
        }
    }
    Ok(())
}

fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(EPHEMERAL_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
