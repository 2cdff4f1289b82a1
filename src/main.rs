use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;
use cli_style::get_styles;

use media_display_server::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_CONTENT_CACHE_AGE_SEC, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_METRICS_PORT, DEFAULT_PORT, DEFAULT_TOKEN_TTL_SEC,
};
use media_display_server::server::ServerConfig;
use media_display_server::{
    run_server, FilePlaylistStore, FsBlobStore, RequestsLoggingLevel, SelectionRegister,
    StaticCredentialStore, TokenService,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles())]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding uploaded media and per-account settings.
    #[clap(long, env = "MEDIA_DATA_DIR", value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// The maximum age of uploaded media in client caches, in seconds.
    #[clap(long, default_value_t = DEFAULT_CONTENT_CACHE_AGE_SEC)]
    pub content_cache_age_sec: usize,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Largest accepted upload body.
    #[clap(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Lifetime of issued and renewed tokens, in seconds.
    #[clap(long, default_value_t = DEFAULT_TOKEN_TTL_SEC)]
    pub token_ttl_sec: u64,

    /// Secret used to sign tokens. A random one is generated when missing.
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Username of the single admin account, used when the config file lists no accounts.
    #[clap(long, env = "SERVER_ADMIN_ACC")]
    pub admin_user: Option<String>,

    /// Hash of the admin secret, see `cli-auth hash`.
    #[clap(long, env = "SERVER_ADMIN_PASS", hide_env_values = true)]
    pub admin_secret_hash: Option<String>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            data_dir: args.data_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            content_cache_age_sec: args.content_cache_age_sec,
            frontend_dir_path: args.frontend_dir_path.clone(),
            max_upload_bytes: args.max_upload_bytes,
            token_ttl_sec: args.token_ttl_sec,
            jwt_secret: args.jwt_secret.clone(),
            admin_user: args.admin_user.clone(),
            admin_secret_hash: args.admin_secret_hash.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Could not initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Using data directory {:?}", app_config.data_dir);
    let blob_store = Arc::new(
        FsBlobStore::new(app_config.uploads_dir())
            .with_context(|| format!("Could not open {:?}", app_config.uploads_dir()))?,
    );
    let playlist_store = Arc::new(FilePlaylistStore::new(app_config.settings_dir())?);

    info!("Loaded {} account(s)", app_config.accounts.len());
    let credential_store = Arc::new(StaticCredentialStore::new(app_config.accounts.clone())?);
    let token_service = Arc::new(TokenService::new(
        app_config.jwt_secret.as_bytes(),
        app_config.token_ttl,
    ));
    let selection = Arc::new(SelectionRegister::new());

    info!(
        "Uploads limited to {:#}",
        byte_unit::Byte::from(app_config.max_upload_bytes as u64)
    );
    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        content_cache_age_sec: app_config.content_cache_age_sec,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        static_media_dir: Some(app_config.uploads_dir()),
        max_upload_bytes: app_config.max_upload_bytes,
    };

    run_server(
        server_config,
        credential_store,
        token_service,
        selection,
        playlist_store,
        blob_store,
    )
    .await
}
