//! Media listing, upload and deletion.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiError;
use super::metrics;
use super::session::Session;
use super::state::*;
use crate::names::is_safe_name;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "media";

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

async fn list_files(
    _session: Session,
    State(blobs): State<GuardedBlobStore>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = blobs.list().await?;
    metrics::set_media_files(names.len());
    Ok(Json(names))
}

/// Keeps only the last path component of a client supplied file name.
fn client_file_name(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw)
}

fn multipart_error(err: &axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File exceeds the upload size limit.".to_string())
    } else {
        ApiError::bad_request("File upload failed or file is corrupted.")
    }
}

async fn upload_file(
    session: Session,
    State(blobs): State<GuardedBlobStore>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|err| {
        warn!("Rejecting upload request: {}", err);
        ApiError::bad_request("No file uploaded.")
    })?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                metrics::record_upload("failure", 0);
                return Err(multipart_error(&err));
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(client_file_name)
            .unwrap_or("")
            .to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((filename, bytes.to_vec())),
            Err(err) => {
                warn!("Failed to read uploaded file: {}", err);
                metrics::record_upload("failure", 0);
                return Err(multipart_error(&err));
            }
        }
        break;
    }

    let (filename, data) = match upload {
        Some(upload) => upload,
        None => {
            metrics::record_upload("failure", 0);
            return Err(ApiError::bad_request("No file uploaded."));
        }
    };
    if !is_safe_name(&filename) {
        metrics::record_upload("failure", 0);
        return Err(ApiError::bad_request("Invalid file name."));
    }

    let size = data.len();
    let stored = match blobs.put(&filename, &data).await {
        Ok(stored) => stored,
        Err(err) => {
            metrics::record_upload("failure", 0);
            return Err(err.into());
        }
    };
    metrics::record_upload("success", size);
    info!("{} uploaded {} ({} bytes)", session.username, stored, size);

    Ok(Json(UploadResponse {
        success: true,
        filename: stored,
    }))
}

async fn delete_file(
    session: Session,
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if let Err(err) = state.blobs.delete(&name).await {
        metrics::record_delete("failure");
        return Err(err.into());
    }
    metrics::record_delete("success");
    info!("{} deleted {}", session.username, name);

    // The file is gone, now drop every playlist reference to it.
    let playlists = state.playlists.clone();
    let pruned_name = name.clone();
    let report =
        tokio::task::spawn_blocking(move || playlists.prune_reference(&pruned_name)).await?;
    metrics::record_prune(report.updated.len(), report.failed.len());
    if !report.is_complete() {
        warn!(
            "{} left referenced in {} account(s): {:?}",
            name,
            report.failed.len(),
            report.failed
        );
    }

    if state.selection.clear_if(&name) {
        metrics::record_selection_change("deselect");
        info!("Deleted media {} was selected, selection cleared", name);
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Deleted \"{}\" from all playlists.", name),
    }))
}

pub fn make_media_routes(state: ServerState) -> Router {
    Router::new()
        .route("/files", get(list_files))
        .route("/upload", post(upload_file))
        .route("/delete/{name}", delete(delete_file))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_client_directories() {
        assert_eq!(client_file_name("photo.jpg"), "photo.jpg");
        assert_eq!(client_file_name("C:\\Users\\me\\photo.jpg"), "photo.jpg");
        assert_eq!(client_file_name("/home/me/clip.mp4"), "clip.mp4");
        assert_eq!(client_file_name("dir/"), "");
    }
}
