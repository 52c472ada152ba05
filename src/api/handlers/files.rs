use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::api::response::{ApiError, AppQuery, DeleteResponse, UploadResponse};
use crate::content_store::{ContentStoreError, DeleteContent, PutContent};
use crate::publish::{self, validate_relative};
use crate::staging::{Release, Staging, StagingSlot};
use crate::AppState;

const UPLOAD_FAILED: &str = "Failed to upload file";
const DELETE_FAILED: &str = "Failed to delete file";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid multipart data: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Staging error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No GitHub tokens configured")]
    NoCredentials,
    #[error(transparent)]
    Remote(#[from] ContentStoreError),
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("No GitHub tokens configured")]
    NoCredentials,
    #[error(transparent)]
    Remote(#[from] ContentStoreError),
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::payload_too_large("File exceeds maximum upload size")
            }
            UploadError::Multipart(_) => ApiError::bad_request("Invalid multipart data"),
            _ => ApiError::internal(UPLOAD_FAILED),
        }
    }
}

/// The `file` field, written to a staging slot.
struct Received {
    original_name: String,
    slot: StagingSlot,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let folder = folder_param(params.folder)?;

    let Some(Received {
        original_name,
        slot,
    }) = receive_file(&state.staging, &mut multipart).await?
    else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    // Once the body is on disk the push runs to completion on its own task,
    // even if the client goes away.
    let task_state = Arc::clone(&state);
    let task = tokio::spawn(async move {
        let result = push_staged(&task_state, &slot, &original_name, folder.as_deref()).await;
        match &result {
            Ok(_) => slot.release(Release::Published).await,
            Err(e) => {
                tracing::error!(file = %original_name, error = %e, "GitHub upload failed");
                slot.release(Release::Failed).await;
            }
        }
        result
    });

    match task.await {
        Ok(Ok(url)) => Ok(UploadResponse::ok(url)),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "Upload task aborted");
            Err(ApiError::internal(UPLOAD_FAILED))
        }
    }
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<DeleteParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let filename = params
        .filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Filename is required"))?;
    let folder = folder_param(params.folder)?;
    validate_relative(&filename).map_err(|e| {
        tracing::debug!(filename = %filename, error = %e, "Rejected filename");
        ApiError::bad_request("Invalid filename")
    })?;

    match remove(&state, folder.as_deref(), &filename).await {
        Ok(()) => Ok(DeleteResponse::ok(format!("Deleted {filename}"))),
        Err(e) => {
            tracing::error!(filename = %filename, error = %e, "GitHub delete failed");
            Err(ApiError::internal(DELETE_FAILED))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// An empty `folder` means no folder.
fn folder_param(folder: Option<String>) -> Result<Option<String>, ApiError> {
    match folder.filter(|f| !f.is_empty()) {
        Some(folder) => {
            validate_relative(&folder).map_err(|e| {
                tracing::debug!(folder = %folder, error = %e, "Rejected folder");
                ApiError::bad_request("Invalid folder")
            })?;
            Ok(Some(folder))
        }
        None => Ok(None),
    }
}

/// Stream the first `file` field into a fresh staging slot. Other fields are ignored.
async fn receive_file(
    staging: &Staging,
    multipart: &mut Multipart,
) -> Result<Option<Received>, ApiError> {
    let mut received: Option<Received> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(received),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid multipart data");
                if let Some(received) = received {
                    received.slot.release(Release::Failed).await;
                }
                return Err(UploadError::from(e).into());
            }
        };

        if received.is_some() || field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let slot = staging.reserve().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to reserve staging slot");
            ApiError::internal(UPLOAD_FAILED)
        })?;

        if let Err(e) = write_field(&slot, field).await {
            tracing::warn!(file = %original_name, error = %e, "Failed to receive upload");
            slot.release(Release::Failed).await;
            return Err(e.into());
        }

        received = Some(Received {
            original_name,
            slot,
        });
    }
}

async fn write_field(slot: &StagingSlot, mut field: Field<'_>) -> Result<(), UploadError> {
    let mut file = tokio::fs::File::create(slot.incoming_path()).await?;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Rename, encode and commit the received file. Returns its public URL.
async fn push_staged(
    state: &AppState,
    slot: &StagingSlot,
    original_name: &str,
    folder: Option<&str>,
) -> Result<String, UploadError> {
    let token = state.rotator.select().ok_or(UploadError::NoCredentials)?;
    let owner = &state.config.github.owner;
    tracing::info!(owner = %owner, "Now uploading file");

    let file_name = publish::stamped_name(original_name, publish::random_id());
    let staged = slot.stage(&file_name).await?;
    tracing::debug!(file = %file_name, "Staged upload");

    let bytes = tokio::fs::read(&staged).await?;
    let content = base64::engine::general_purpose::STANDARD.encode(&bytes);

    let target = state.config.publish.target(folder, &file_name);
    let store = state.content_store.as_ref();

    // Any lookup failure means "create".
    let sha = match store.revision(&target.path, token).await {
        Ok(sha) => {
            tracing::info!(path = %target.path, "Existing file found, using SHA for update");
            Some(sha)
        }
        Err(ContentStoreError::NotFound(_)) => {
            tracing::info!(path = %target.path, "No existing file found, creating");
            None
        }
        Err(e) => {
            tracing::warn!(path = %target.path, error = %e, "Revision lookup failed, creating");
            None
        }
    };

    let put = PutContent {
        message: format!("Uploaded {file_name} {}", target.url),
        content,
        sha,
    };
    let path = target.path.as_str();
    state
        .config
        .retry
        .run("upload", move || store.put(path, token, put.clone()))
        .await?;

    tracing::info!(owner = %owner, path = %target.path, bytes = bytes.len(), "File uploaded");
    Ok(target.url)
}

async fn remove(state: &AppState, folder: Option<&str>, filename: &str) -> Result<(), DeleteError> {
    let token = state.rotator.select().ok_or(DeleteError::NoCredentials)?;
    let target_folder = state.config.publish.folder(folder);
    let path = format!("{target_folder}/{filename}");
    tracing::info!(
        owner = %state.config.github.owner,
        folder = %target_folder,
        filename,
        "Now deleting file"
    );

    let store = state.content_store.as_ref();
    // Unlike upload, a missing file is an error here.
    let sha = store.revision(&path, token).await?;
    store
        .delete(
            &path,
            token,
            DeleteContent {
                message: format!("Deleted {filename}"),
                sha,
            },
        )
        .await?;

    tracing::info!(path = %path, "File deleted");
    Ok(())
}
