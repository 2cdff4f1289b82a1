use std::path::PathBuf;

use super::RequestsLoggingLevel;
use crate::config::{
    DEFAULT_CONTENT_CACHE_AGE_SEC, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_METRICS_PORT, DEFAULT_PORT,
};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub content_cache_age_sec: usize,
    pub frontend_dir_path: Option<String>,
    /// Directory served read-only under `/api/uploads`. Not served when None.
    pub static_media_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            content_cache_age_sec: DEFAULT_CONTENT_CACHE_AGE_SEC,
            frontend_dir_path: None,
            static_media_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
