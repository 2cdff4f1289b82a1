//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own data directory.

use super::constants::*;
use media_display_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use media_display_server::user::{
    Account, AccountSettings, FilePlaylistStore, PlaylistStore, SecretHasher,
    StaticCredentialStore, TokenService,
};
use media_display_server::{FsBlobStore, SelectionRegister};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated data directory
///
/// When dropped, the server gracefully shuts down and the directory is removed.
#[allow(dead_code)]
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The selection shared with the running server
    pub selection: Arc<SelectionRegister>,

    /// Playlist store for direct access in tests
    pub playlists: Arc<FilePlaylistStore>,

    /// Token service the server signs with
    pub tokens: Arc<TokenService>,

    /// Directory uploaded media lands in
    pub uploads_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

fn test_accounts() -> Vec<Account> {
    vec![
        Account {
            username: TEST_USER.to_string(),
            secret_hash: SecretHasher::Sha256
                .hash(TEST_PASS)
                .expect("Failed to hash test password"),
        },
        Account {
            username: ADMIN_USER.to_string(),
            secret_hash: SecretHasher::Argon2
                .hash(ADMIN_PASS)
                .expect("Failed to hash admin password"),
        },
    ]
}

#[allow(dead_code)]
impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the data directory cannot be prepared, the port cannot be
    /// bound or the server doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        Self::spawn_with_ttl(Duration::from_secs(60 * 60)).await
    }

    /// Same as `spawn`, with a custom token lifetime
    pub async fn spawn_with_ttl(token_ttl: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let uploads_dir = temp_dir.path().join("uploads");

        let blobs = Arc::new(FsBlobStore::new(&uploads_dir).expect("Failed to open blob store"));
        let playlists = Arc::new(
            FilePlaylistStore::new(temp_dir.path().join("settings"))
                .expect("Failed to open playlist store"),
        );
        let credentials = Arc::new(
            StaticCredentialStore::new(test_accounts()).expect("Failed to load test accounts"),
        );
        let tokens = Arc::new(TokenService::new(b"test-secret", token_ttl));
        let selection = Arc::new(SelectionRegister::new());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            content_cache_age_sec: 0, // Disable caching in tests
            frontend_dir_path: None,
            static_media_dir: Some(uploads_dir.clone()),
            max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
            ..ServerConfig::default()
        };

        let app = make_app(
            config,
            credentials,
            tokens.clone(),
            selection.clone(),
            playlists.clone(),
            blobs,
        )
        .expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            selection,
            playlists,
            tokens,
            uploads_dir,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Writes a settings document behind the server's back
    pub fn seed_settings(&self, account: &str, settings: AccountSettings) {
        self.playlists
            .replace(account, settings)
            .expect("Failed to seed settings");
    }

    /// Waits for the server to become ready by polling the status route
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
