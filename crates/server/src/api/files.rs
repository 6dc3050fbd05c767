//! Application document uploads.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use permittree_core::{Application, ApplicationId};
use permittree_workflow::UploadedFile;

use crate::auth::identity::CallerIdentity;
use crate::auth::role::Permission;
use crate::error::ServerError;

use super::AppState;
use super::schemas::{ErrorResponse, FileUpload};

/// Decode a base64 upload body.
pub(crate) fn decode_upload(upload: FileUpload) -> Result<UploadedFile, ServerError> {
    let data = STANDARD
        .decode(upload.data.trim())
        .map_err(|e| ServerError::BadRequest(format!("data is not valid base64: {e}")))?;
    Ok(UploadedFile {
        filename: upload.filename,
        content_type: upload.content_type,
        data: Bytes::from(data),
    })
}

/// Quote a filename for `Content-Disposition`, dropping characters that
/// cannot appear in a header value.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    let safe = if safe.is_empty() { "download".to_owned() } else { safe };
    format!("attachment; filename=\"{safe}\"")
}

/// `PUT /api/permits/{id}/files/{key}` -- attach or replace a document.
#[utoipa::path(
    put,
    path = "/api/permits/{id}/files/{key}",
    tag = "Files",
    summary = "Upload document",
    description = "Stores a document under a key of the permit type. Owner only, while editable.",
    params(
        ("id" = String, Path, description = "Application ID"),
        ("key" = String, Path, description = "Document key, e.g. `or_cr`")
    ),
    request_body(content = FileUpload, description = "Filename, content type and base64 data"),
    responses(
        (status = 200, description = "Updated application", body = Application),
        (
            status = 400,
            description = "Unknown key, bad base64 or unsupported content type",
            body = ErrorResponse
        ),
        (status = 413, description = "File too large", body = ErrorResponse)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path((id, key)): Path<(String, String)>,
    Json(body): Json<FileUpload>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    let file = decode_upload(body)?;
    let app = state
        .workflow
        .upload_file(&identity.to_caller(), &ApplicationId::new(id), &key, file)
        .await?;
    Ok(Json(app))
}

/// `GET /api/permits/{id}/files/{key}` -- the stored bytes.
#[utoipa::path(
    get,
    path = "/api/permits/{id}/files/{key}",
    tag = "Files",
    summary = "Download document",
    params(
        ("id" = String, Path, description = "Application ID"),
        ("key" = String, Path, description = "Document key")
    ),
    responses(
        (status = 200, description = "Raw file content with its stored content type"),
        (status = 404, description = "No file under that key", body = ErrorResponse)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path((id, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let blob = state
        .workflow
        .download_file(&identity.to_caller(), &ApplicationId::new(id), &key)
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, blob.metadata.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&blob.metadata.filename),
            ),
        ],
        blob.data,
    ))
}

/// `DELETE /api/permits/{id}/files/{key}`
#[utoipa::path(
    delete,
    path = "/api/permits/{id}/files/{key}",
    tag = "Files",
    summary = "Remove document",
    params(
        ("id" = String, Path, description = "Application ID"),
        ("key" = String, Path, description = "Document key")
    ),
    responses(
        (status = 200, description = "Updated application", body = Application),
        (status = 404, description = "No file under that key", body = ErrorResponse)
    )
)]
pub async fn remove_file(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path((id, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    let app = state
        .workflow
        .remove_file(&identity.to_caller(), &ApplicationId::new(id), &key)
        .await?;
    Ok(Json(app))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base64() {
        let err = decode_upload(FileUpload {
            filename: "a.pdf".into(),
            content_type: "application/pdf".into(),
            data: "not base64!".into(),
        })
        .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn disposition_strips_header_breaking_characters() {
        assert_eq!(
            content_disposition("or\"cr\n.pdf"),
            "attachment; filename=\"orcr.pdf\""
        );
        assert_eq!(
            content_disposition("ñ"),
            "attachment; filename=\"download\""
        );
    }
}
