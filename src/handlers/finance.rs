//! Accounts receivable and payable.
//!
//! - POST/GET /v1/finance/entries
//! - GET/DELETE /v1/finance/entries/{id}
//! - POST /v1/finance/entries/{id}/payments
//! - POST /v1/finance/entries/{id}/cancel
//! - POST /v1/finance/entries/mark-overdue
//! - GET /v1/finance/summary

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
use crate::models::auth::permissions;
use crate::models::finance::{
    CreateFinanceEntryRequest, FinanceEntry, FinanceEntryFilter, FinanceSummary,
    MarkOverdueResponse, RegisterPaymentRequest, SummaryQuery,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::finance_service;

/// Create a receivable or payable.
///
/// # Request Body
///
/// ```json
/// {
///   "entry_type": "RECEIVABLE",
///   "description": "Invoice 1042",
///   "counterparty": "Globex",
///   "amount_cents": 150000,
///   "issue_date": "2025-03-01",
///   "due_date": "2025-03-31"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the entry, status `PENDING`
/// - **400**: non-positive amount or a due date before the issue date
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateFinanceEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::FINANCE_WRITE)?;
    let entry = finance_service::create_entry(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// List entries. Filters: `entry_type`, `status`, `due_from`, `due_to`.
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<FinanceEntryFilter>,
) -> Result<Json<PaginatedResponse<FinanceEntry>>, AppError> {
    auth.require(permissions::FINANCE_READ)?;
    let page = PageRequest::from(page);
    let entries = finance_service::list_entries(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(entries, page)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinanceEntry>, AppError> {
    auth.require(permissions::FINANCE_READ)?;
    Ok(Json(finance_service::get_entry(&state.ctx, &auth, id).await?))
}

/// Register a (partial) payment.
///
/// # Request Body
///
/// ```json
/// { "amount_cents": 50000 }
/// ```
///
/// The entry becomes `PARTIALLY_PAID` until the open amount reaches zero,
/// then `PAID`. Paying more than the open amount returns 400.
pub async fn register_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<RegisterPaymentRequest>,
) -> Result<Json<FinanceEntry>, AppError> {
    auth.require(permissions::FINANCE_PAY)?;
    Ok(Json(
        finance_service::register_payment(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn cancel_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinanceEntry>, AppError> {
    auth.require(permissions::FINANCE_WRITE)?;
    Ok(Json(
        finance_service::cancel_entry(&state.ctx, &auth, id).await?,
    ))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::FINANCE_WRITE)?;
    finance_service::delete_entry(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flag open entries whose due date has passed. Returns `{ "updated": n }`.
pub async fn mark_overdue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MarkOverdueResponse>, AppError> {
    auth.require(permissions::FINANCE_WRITE)?;
    Ok(Json(finance_service::mark_overdue(&state.ctx, &auth).await?))
}

/// Totals per direction, optionally bounded by `?from=&to=` on the due date.
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<FinanceSummary>, AppError> {
    auth.require(permissions::FINANCE_READ)?;
    Ok(Json(finance_service::summary(&state.ctx, &auth, query).await?))
}
