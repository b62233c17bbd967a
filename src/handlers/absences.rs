//! Absence requests and their review workflow.
//!
//! `PENDING -> APPROVED | REJECTED | CANCELLED`, and `APPROVED -> CANCELLED`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::absence::{Absence, AbsenceFilter, RejectAbsenceRequest, RequestAbsenceRequest};
use crate::models::auth::permissions;
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::absence_service;

/// Request an absence for an employee.
///
/// # Endpoint
///
/// `POST /v1/absences`
///
/// # Response
///
/// - **201 Created**: the absence, status `PENDING`, `total_days` inclusive
/// - **400**: end before start, a missing document where the type needs one,
///   a terminated employee, or an overlap with another pending or approved
///   absence
/// - **404**: unknown employee
pub async fn request_absence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RequestAbsenceRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::ABSENCES_WRITE)?;
    let absence = absence_service::request_absence(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(absence)))
}

pub async fn list_absences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<AbsenceFilter>,
) -> Result<Json<PaginatedResponse<Absence>>, AppError> {
    auth.require(permissions::ABSENCES_READ)?;
    let page = PageRequest::from(page);
    let absences = absence_service::list_absences(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(absences, page)))
}

pub async fn get_absence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Absence>, AppError> {
    auth.require(permissions::ABSENCES_READ)?;
    Ok(Json(absence_service::get_absence(&state.ctx, &auth, id).await?))
}

/// Approve a pending absence. The caller becomes the reviewer.
pub async fn approve_absence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Absence>, AppError> {
    auth.require(permissions::ABSENCES_APPROVE)?;
    Ok(Json(
        absence_service::approve_absence(&state.ctx, &auth, id).await?,
    ))
}

/// Reject a pending absence with `{ "reason": "…" }`.
pub async fn reject_absence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectAbsenceRequest>,
) -> Result<Json<Absence>, AppError> {
    auth.require(permissions::ABSENCES_APPROVE)?;
    Ok(Json(
        absence_service::reject_absence(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn cancel_absence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Absence>, AppError> {
    auth.require(permissions::ABSENCES_WRITE)?;
    Ok(Json(
        absence_service::cancel_absence(&state.ctx, &auth, id).await?,
    ))
}
