//! Per-account playlist documents.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::session::Session;
use super::state::*;
use crate::user::{AccountSettings, Playlist};

const MISSING_FIELDS: &str = "Missing account or playlists in request body.";

#[derive(Deserialize, Debug)]
struct SaveSettingsBody {
    pub account: Option<String>,
    pub playlists: Option<Vec<Playlist>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SaveSettingsResponse {
    pub success: bool,
}

async fn get_settings(
    _session: Session,
    State(playlists): State<GuardedPlaylistStore>,
    Path(account): Path<String>,
) -> Result<Json<AccountSettings>, ApiError> {
    let settings = tokio::task::spawn_blocking(move || playlists.get(&account)).await??;
    match settings {
        Some(settings) => Ok(Json(settings)),
        None => Err(ApiError::not_found("Settings not found for this account.")),
    }
}

async fn save_settings(
    session: Session,
    State(playlists): State<GuardedPlaylistStore>,
    body: Result<Json<SaveSettingsBody>, JsonRejection>,
) -> Result<Json<SaveSettingsResponse>, ApiError> {
    let Json(body) = body.map_err(|_| ApiError::bad_request(MISSING_FIELDS))?;
    let (account, playlist_list) = match (body.account, body.playlists) {
        (Some(account), Some(playlists)) if !account.is_empty() => (account, playlists),
        _ => return Err(ApiError::bad_request(MISSING_FIELDS)),
    };

    let target = account.clone();
    let stored = tokio::task::spawn_blocking(move || {
        playlists.replace(&target, AccountSettings::new(playlist_list))
    })
    .await??;
    info!(
        "{} saved {} playlists for {}",
        session.username,
        stored.playlists.len(),
        account
    );

    Ok(Json(SaveSettingsResponse { success: true }))
}

pub fn make_settings_routes(state: ServerState) -> Router {
    Router::new()
        .route("/settings", post(save_settings))
        .route("/settings/{account}", get(get_settings))
        .with_state(state)
}
