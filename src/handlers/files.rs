//! File uploads such as absence certificates and product images.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::auth::permissions;
use crate::models::file::{DeleteFileQuery, UploadQuery};
use crate::services::storage_service::{self, Upload};

/// Upload a file.
///
/// # Endpoint
///
/// `POST /v1/files?folder=absences&filename=certificate.pdf`
///
/// The request body is the raw file; its type comes from `Content-Type`.
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "key": "<tenant_id>/absences/5f0c…-certificate.pdf",
///   "url": "/files/<tenant_id>/absences/5f0c…-certificate.pdf",
///   "size": 48213,
///   "content_type": "application/pdf"
/// }
/// ```
///
/// # Errors
///
/// - **400**: empty body, body over `UPLOAD_MAX_BYTES`, or a content type
///   outside the allow-list (PDF, PNG, JPEG, WebP, CSV, plain text)
/// - **500**: the storage backend failed
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::FILES_WRITE)?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream");

    let file = storage_service::upload(
        &state.ctx,
        state.storage.as_ref(),
        state.upload_max_bytes,
        &auth,
        Upload {
            folder: query.folder,
            filename: query.filename,
            content_type,
            data: &body,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// Delete a file by key: `DELETE /v1/files?key=…`. Keys of other tenants
/// answer 404.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DeleteFileQuery>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::FILES_WRITE)?;
    storage_service::delete(&state.ctx, state.storage.as_ref(), &auth, &query.key).await?;
    Ok(StatusCode::NO_CONTENT)
}
