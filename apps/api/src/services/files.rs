//! Presigned uploads.

use serde::Deserialize;
use tracing::{debug, info};

use forex_core::ValidationError;

use super::product_entry::UploadUrlRequest;
use crate::error::ApiResult;
use crate::storage::{validate_upload, UploadUrl};
use crate::AppState;

/// Folders clients may upload into.
pub const UPLOAD_FOLDERS: [&str; 2] = ["products", "users"];

/// Upload request naming its target folder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderUploadRequest {
    pub folder: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Presigned PUT URL for `folder`. The key lands in the temp area until the
/// owning entity is saved.
pub async fn upload_url(
    state: &AppState,
    folder: &str,
    request: UploadUrlRequest,
) -> ApiResult<UploadUrl> {
    debug!(folder = %folder, file_name = %request.file_name, "Presigning upload");
    validate_upload(
        &request.file_name,
        request.file_size,
        state.config.storage.upload_max_bytes,
    )?;

    let upload = state.storage.upload_url(folder, &request.file_name).await?;
    info!(key = %upload.key, "Upload URL issued");
    Ok(upload)
}

pub async fn folder_upload_url(state: &AppState, request: FolderUploadRequest) -> ApiResult<UploadUrl> {
    let folder = request.folder.trim();
    if !UPLOAD_FOLDERS.contains(&folder) {
        return Err(ValidationError::NotAllowed {
            field: "folder".to_string(),
            allowed: UPLOAD_FOLDERS.iter().map(|f| f.to_string()).collect(),
        }
        .into());
    }
    upload_url(
        state,
        folder,
        UploadUrlRequest {
            file_name: request.file_name,
            file_size: request.file_size,
        },
    )
    .await
}
