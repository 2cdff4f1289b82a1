//! HTTP clients for the controller and display roles.
//!
//! `ControllerClient` logs in, keeps its token fresh and drives every
//! authenticated route. `DisplayPoller` only ever reads the selection.

mod display;
mod renewal;

pub use display::{DisplayPoller, DEFAULT_POLL_INTERVAL};
pub use renewal::{token_expiry, RenewalPolicy, TokenFreshness, DEFAULT_RENEWAL_THRESHOLD};

use reqwest::{multipart, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::user::{AccountSettings, Clock, Playlist, SystemClock};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server url: {0}")]
    InvalidUrl(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Session expired, log in again")]
    SessionExpired,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Body of login and refresh responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeldToken {
    value: String,
    username: Option<String>,
    expires_at: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct SelectionBody {
    selected: Option<String>,
}

#[derive(Deserialize)]
struct UploadBody {
    filename: String,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Serialize)]
struct SaveSettingsBody<'a> {
    account: &'a str,
    playlists: &'a [Playlist],
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .push("api")
        .extend(segments);
    Ok(url)
}

fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    Url::parse(base_url).map_err(|err| ClientError::InvalidUrl(format!("{}: {}", base_url, err)))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    if status == StatusCode::UNAUTHORIZED {
        Err(ClientError::Unauthorized(message))
    } else {
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

pub struct ControllerClient {
    client: reqwest::Client,
    base_url: Url,
    policy: RenewalPolicy,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<HeldToken>>,
}

impl ControllerClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_clock(base_url, RenewalPolicy::default(), Arc::new(SystemClock))
    }

    pub fn with_clock(
        base_url: &str,
        policy: RenewalPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            policy,
            clock,
            token: Mutex::new(None),
        })
    }

    /// Resumes a session from a token obtained earlier, e.g. kept in a file.
    pub fn set_token(&self, token: &str) -> Result<(), ClientError> {
        let expires_at = token_expiry(token).ok_or(ClientError::NotLoggedIn)?;
        self.store_token(HeldToken {
            value: token.to_string(),
            username: None,
            expires_at,
        });
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.held_token().map(|t| t.value)
    }

    pub fn username(&self) -> Option<String> {
        self.held_token().and_then(|t| t.username)
    }

    pub fn freshness(&self) -> Option<TokenFreshness> {
        self.held_token()
            .map(|t| self.policy.assess(t.expires_at, self.clock.now_secs()))
    }

    pub fn logout(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn held_token(&self) -> Option<HeldToken> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_token(&self, token: HeldToken) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn hold_issued(&self, issued: IssuedToken) -> Result<(), ClientError> {
        let expires_at = issued
            .expires_at
            .or_else(|| token_expiry(&issued.token))
            .ok_or(ClientError::NotLoggedIn)?;
        self.store_token(HeldToken {
            value: issued.token,
            username: Some(issued.username),
            expires_at,
        });
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let url = endpoint(&self.base_url, &["login"])?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        let issued: IssuedToken = read_json(response).await?;
        info!("Logged in as {}", issued.username);
        self.hold_issued(issued)
    }

    /// Swaps the held token for a new one, whatever its remaining lifetime.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let current = self.held_token().ok_or(ClientError::NotLoggedIn)?;
        let url = endpoint(&self.base_url, &["refresh"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&current.value)
            .send()
            .await?;
        let issued: IssuedToken = read_json(response).await?;
        debug!("Token renewed");
        self.hold_issued(issued)
    }

    /// Returns a token good for at least the renewal threshold, renewing first
    /// when it is about to run out.
    pub async fn ensure_fresh(&self) -> Result<String, ClientError> {
        let current = self.held_token().ok_or(ClientError::NotLoggedIn)?;
        match self.policy.assess(current.expires_at, self.clock.now_secs()) {
            TokenFreshness::Fresh => Ok(current.value),
            TokenFreshness::NeedsRenewal => {
                self.refresh().await?;
                self.token().ok_or(ClientError::NotLoggedIn)
            }
            TokenFreshness::Expired => Err(ClientError::SessionExpired),
        }
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, ClientError> {
        let token = self.ensure_fresh().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    pub async fn list_files(&self) -> Result<Vec<String>, ClientError> {
        let url = endpoint(&self.base_url, &["files"])?;
        let response = self.authorized(Method::GET, url).await?.send().await?;
        read_json(response).await
    }

    /// Uploads `data` as `filename`. Returns the name it was stored under.
    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<String, ClientError> {
        let url = endpoint(&self.base_url, &["upload"])?;
        let part = multipart::Part::bytes(data).file_name(filename.to_string());
        let form = multipart::Form::new().part("media", part);
        let response = self
            .authorized(Method::POST, url)
            .await?
            .multipart(form)
            .send()
            .await?;
        let body: UploadBody = read_json(response).await?;
        Ok(body.filename)
    }

    pub async fn delete(&self, name: &str) -> Result<String, ClientError> {
        let url = endpoint(&self.base_url, &["delete", name])?;
        let response = self.authorized(Method::DELETE, url).await?.send().await?;
        let body: MessageBody = read_json(response).await?;
        Ok(body.message)
    }

    pub async fn select(&self, name: &str) -> Result<Option<String>, ClientError> {
        let url = endpoint(&self.base_url, &["select"])?;
        let response = self
            .authorized(Method::POST, url)
            .await?
            .json(&serde_json::json!({ "filename": name }))
            .send()
            .await?;
        let body: SelectionBody = read_json(response).await?;
        Ok(body.selected)
    }

    pub async fn deselect(&self) -> Result<(), ClientError> {
        let url = endpoint(&self.base_url, &["deselect"])?;
        let response = self.authorized(Method::POST, url).await?.send().await?;
        let _: SelectionBody = read_json(response).await?;
        Ok(())
    }

    /// The current selection. Needs no login.
    pub async fn selected(&self) -> Result<Option<String>, ClientError> {
        fetch_selected(&self.client, &self.base_url).await
    }

    /// Loads the account's playlists, creating an empty document the first
    /// time an account is seen.
    pub async fn load_settings(&self, account: &str) -> Result<AccountSettings, ClientError> {
        let url = endpoint(&self.base_url, &["settings", account])?;
        let response = self.authorized(Method::GET, url).await?.send().await?;
        match read_json::<AccountSettings>(response).await {
            Ok(settings) => Ok(settings),
            Err(ClientError::Api { status: 404, .. }) => {
                info!("No settings for {} yet, creating them", account);
                let empty = AccountSettings::default();
                self.save_settings(account, &empty).await?;
                Ok(empty)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn save_settings(
        &self,
        account: &str,
        settings: &AccountSettings,
    ) -> Result<(), ClientError> {
        let url = endpoint(&self.base_url, &["settings"])?;
        let response = self
            .authorized(Method::POST, url)
            .await?
            .json(&SaveSettingsBody {
                account,
                playlists: &settings.playlists,
            })
            .send()
            .await?;
        let _: serde_json::Value = read_json(response).await?;
        Ok(())
    }
}

pub(crate) async fn fetch_selected(
    client: &reqwest::Client,
    base_url: &Url,
) -> Result<Option<String>, ClientError> {
    let url = endpoint(base_url, &["selected"])?;
    let response = client.get(url).send().await?;
    let body: SelectionBody = read_json(response).await?;
    Ok(body.selected)
}
