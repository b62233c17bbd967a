//! Read access to the signed audit trail.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditFilter, AuditLog, VerifyResponse};
use crate::models::auth::permissions;
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::audit_service;

/// Audit entries, newest first.
///
/// Filters: `module`, `entity`, `entity_id`, `user_id`, `action`, and a
/// `from`/`to` window on the creation time (RFC 3339).
pub async fn list_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<PaginatedResponse<AuditLog>>, AppError> {
    auth.require(permissions::AUDIT_READ)?;
    let page = PageRequest::from(page);
    let logs = audit_service::list_logs(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(logs, page)))
}

pub async fn get_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditLog>, AppError> {
    auth.require(permissions::AUDIT_READ)?;
    Ok(Json(audit_service::get_log(&state.ctx, &auth, id).await?))
}

/// Recompute the HMAC of an entry and compare it with the stored signature.
///
/// # Response (200 OK)
///
/// ```json
/// { "id": "…", "valid": true }
/// ```
///
/// `valid: false` means the row changed after it was written.
pub async fn verify_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerifyResponse>, AppError> {
    auth.require(permissions::AUDIT_VERIFY)?;
    Ok(Json(audit_service::verify_log(&state.ctx, &auth, id).await?))
}
