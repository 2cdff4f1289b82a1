use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use tower_http::services::ServeDir;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::metrics::{self, metrics_handler};
use super::session::{BearerToken, Session};
use super::{
    http_cache, log_requests, media_routes::make_media_routes,
    settings_routes::make_settings_routes, state::*, ServerConfig,
};
#[cfg(feature = "slowdown")]
use super::slowdown_request;
use crate::blob_store::BlobStore;
use crate::selection::SelectionRegister;
use crate::user::{CredentialStore, PlaylistStore, SessionToken, TokenService};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub username: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
    pub username: String,
    pub expires_at: u64,
}

impl From<SessionToken> for TokenResponse {
    fn from(token: SessionToken) -> Self {
        TokenResponse {
            token: token.value,
            username: token.subject,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Deserialize)]
struct SelectBody {
    pub filename: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SelectionResponse {
    pub selected: Option<String>,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        username: session.map(|s| s.username),
    };
    Json(stats)
}

async fn login(
    State(state): State<ServerState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(LoginBody { username, password }) =
        body.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let start = Instant::now();

    // Hash checks are CPU bound, keep them off the async workers.
    let credentials = state.credentials.clone();
    let candidate = username.clone();
    let account =
        tokio::task::spawn_blocking(move || credentials.verify(&candidate, &password)).await?;

    let account = match account {
        Some(account) => account,
        None => {
            metrics::record_login_attempt("failure", start.elapsed());
            info!("Failed login for {}", username);
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }
    };

    let token = state.tokens.issue(&account).map_err(|err| {
        error!("Error with auth token generation: {}", err);
        ApiError::internal("Could not issue token.")
    })?;
    metrics::record_login_attempt("success", start.elapsed());
    info!("{} logged in", account.username);
    Ok(Json(token.into()))
}

async fn refresh(
    State(tokens): State<GuardedTokenService>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenResponse>, ApiError> {
    match tokens.renew(&token) {
        Ok(renewed) => {
            metrics::record_token_renewal("success");
            debug!("Renewed token of {}", renewed.subject);
            Ok(Json(renewed.into()))
        }
        Err(err) => {
            metrics::record_token_renewal("failure");
            debug!("Refusing token renewal: {}", err);
            Err(ApiError::Unauthorized("Invalid or expired token".to_string()))
        }
    }
}

async fn select(
    session: Session,
    State(selection): State<GuardedSelection>,
    body: Result<Json<SelectBody>, JsonRejection>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let Json(body) = body.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let filename = match body.filename {
        Some(filename) if !filename.is_empty() => filename,
        _ => return Err(ApiError::bad_request("Missing filename in request body.")),
    };

    info!("{} selected {}", session.username, filename);
    selection.select(filename.clone());
    metrics::record_selection_change("select");
    Ok(Json(SelectionResponse {
        selected: Some(filename),
    }))
}

async fn deselect(
    session: Session,
    State(selection): State<GuardedSelection>,
) -> Json<SelectionResponse> {
    if let Some(previous) = selection.deselect() {
        info!("{} deselected {}", session.username, previous);
    }
    metrics::record_selection_change("deselect");
    Json(SelectionResponse { selected: None })
}

/// Open to everyone: display clients poll this without logging in.
async fn selected(State(selection): State<GuardedSelection>) -> Json<SelectionResponse> {
    Json(SelectionResponse {
        selected: selection.read(),
    })
}

pub fn make_app(
    config: ServerConfig,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    selection: Arc<SelectionRegister>,
    playlists: Arc<dyn PlaylistStore>,
    blobs: Arc<dyn BlobStore>,
) -> Result<Router> {
    let state = ServerState::new(
        config.clone(),
        credentials,
        tokens,
        selection,
        playlists,
        blobs,
    );

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .with_state(state.clone());

    let selection_routes: Router = Router::new()
        .route("/select", post(select))
        .route("/deselect", post(deselect))
        .route("/selected", get(selected))
        .with_state(state.clone());

    let media_routes = make_media_routes(state.clone())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    let mut api_routes: Router = Router::new()
        .merge(auth_routes)
        .merge(selection_routes)
        .merge(media_routes)
        .merge(make_settings_routes(state.clone()));

    if let Some(media_dir) = &config.static_media_dir {
        let uploads_routes: Router = Router::new()
            .nest_service("/uploads", ServeDir::new(media_dir))
            .layer(middleware::from_fn_with_state(
                config.content_cache_age_sec,
                http_cache,
            ));
        api_routes = api_routes.merge(uploads_routes);
    }

    let home_router: Router = match &config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    #[allow(unused_mut)]
    let mut app: Router = home_router.nest("/api", api_routes);

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}

async fn run_metrics_server(port: u16) -> Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Could not bind metrics port {}", port))?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn run_server(
    config: ServerConfig,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    selection: Arc<SelectionRegister>,
    playlists: Arc<dyn PlaylistStore>,
    blobs: Arc<dyn BlobStore>,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, credentials, tokens, selection, playlists, blobs)?;

    metrics::init_metrics();
    tokio::spawn(async move {
        if let Err(err) = run_metrics_server(metrics_port).await {
            error!("Metrics server stopped: {:#}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Could not bind port {}", port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::FsBlobStore;
    use crate::user::{Account, FilePlaylistStore, SecretHasher, StaticCredentialStore};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    struct TestApp {
        app: Router,
        tokens: Arc<TokenService>,
        selection: Arc<SelectionRegister>,
        _dir: TempDir,
    }

    fn make_test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let credentials = Arc::new(
            StaticCredentialStore::new(vec![Account {
                username: "admin".to_string(),
                secret_hash: SecretHasher::Sha256.hash("secret").unwrap(),
            }])
            .unwrap(),
        );
        let tokens = Arc::new(TokenService::new(b"test-secret", Duration::from_secs(60)));
        let selection = Arc::new(SelectionRegister::new());
        let playlists = Arc::new(FilePlaylistStore::new(dir.path().join("settings")).unwrap());
        let blobs = Arc::new(FsBlobStore::new(dir.path().join("uploads")).unwrap());
        let config = ServerConfig {
            requests_logging_level: crate::server::RequestsLoggingLevel::None,
            static_media_dir: Some(blobs.root().to_path_buf()),
            ..Default::default()
        };

        let app = make_app(
            config,
            credentials,
            tokens.clone(),
            selection.clone(),
            playlists,
            blobs,
        )
        .unwrap();
        TestApp {
            app,
            tokens,
            selection,
            _dir: dir,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(
            format_uptime(Duration::from_secs(86_400 + 3 * 3600 + 4 * 60 + 5)),
            "1d 03:04:05"
        );
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let test_app = make_test_app();

        let protected_routes = vec![
            ("GET", "/api/files"),
            ("POST", "/api/upload"),
            ("DELETE", "/api/delete/a.png"),
            ("POST", "/api/select"),
            ("POST", "/api/deselect"),
            ("GET", "/api/settings/admin"),
            ("POST", "/api/settings"),
            ("POST", "/api/refresh"),
        ];

        for (method, route) in protected_routes.into_iter() {
            let request = Request::builder()
                .method(method)
                .uri(route)
                .body(Body::empty())
                .unwrap();
            let response = test_app.app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, route);
            assert_eq!(
                body_json(response).await,
                serde_json::json!({ "error": "No token provided" })
            );
        }
    }

    #[tokio::test]
    async fn distinguishes_malformed_and_invalid_tokens() {
        let test_app = make_test_app();

        let request = Request::builder()
            .uri("/api/files")
            .header(header::AUTHORIZATION, "Bearer")
            .body(Body::empty())
            .unwrap();
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Malformed token");

        let request = Request::builder()
            .uri("/api/files")
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let test_app = make_test_app();
        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({ "username": "admin", "password": "secret" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: TokenResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.username, "admin");
        let verified = test_app.tokens.verify(&body.token).unwrap();
        assert_eq!(verified.subject, "admin");
        assert_eq!(verified.expires_at, body.expires_at);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let test_app = make_test_app();
        for body in [
            serde_json::json!({ "username": "admin", "password": "wrong" }),
            serde_json::json!({ "username": "ghost", "password": "secret" }),
            serde_json::json!({}),
        ] {
            let response = test_app
                .app
                .clone()
                .oneshot(json_request("POST", "/api/login", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                body_json(response).await["error"],
                "Invalid username or password"
            );
        }
    }

    #[tokio::test]
    async fn selected_is_public_and_select_is_guarded() {
        let test_app = make_test_app();
        test_app.selection.select("clip.mp4");

        let request = Request::builder()
            .uri("/api/selected")
            .body(Body::empty())
            .unwrap();
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "selected": "clip.mp4" })
        );

        let response = test_app
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/select",
                serde_json::json!({ "filename": "other.png" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(test_app.selection.read(), Some("clip.mp4".to_string()));
    }

    #[tokio::test]
    async fn select_requires_filename() {
        let test_app = make_test_app();
        let token = test_app
            .tokens
            .issue(&Account {
                username: "admin".to_string(),
                secret_hash: String::new(),
            })
            .unwrap();

        let mut request = json_request("POST", "/api/select", serde_json::json!({}));
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token.value).parse().unwrap(),
        );
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(test_app.selection.read(), None);
    }

    #[tokio::test]
    async fn home_reports_status() {
        let test_app = make_test_app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["uptime"].as_str().unwrap().starts_with("0d"));
        assert!(body["username"].is_null());
    }
}
