//! Monthly payroll runs.
//!
//! `DRAFT -> CALCULATED -> APPROVED -> PAID`. Draft, calculated and approved
//! runs can be cancelled. Approval and payment have their own permissions.

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
use crate::models::payroll::{CreatePayrollRequest, Payroll, PayrollDetail, PayrollFilter};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::payroll_service;

/// Open a payroll for a reference month.
///
/// # Request Body
///
/// ```json
/// { "reference_month": 3, "reference_year": 2025 }
/// ```
///
/// # Response
///
/// - **201 Created**: the payroll, status `DRAFT`
/// - **400**: month outside 1..=12 or year outside 2000..=2100
/// - **409**: a payroll for that month already exists
pub async fn create_payroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePayrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::PAYROLL_WRITE)?;
    let payroll = payroll_service::create_payroll(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(payroll)))
}

pub async fn list_payrolls(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<PayrollFilter>,
) -> Result<Json<PaginatedResponse<Payroll>>, AppError> {
    auth.require(permissions::PAYROLL_READ)?;
    let page = PageRequest::from(page);
    let payrolls = payroll_service::list_payrolls(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(payrolls, page)))
}

/// Payroll with its line items.
pub async fn get_payroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PayrollDetail>, AppError> {
    auth.require(permissions::PAYROLL_READ)?;
    Ok(Json(payroll_service::get_payroll(&state.ctx, &auth, id).await?))
}

/// (Re)compute the items of a draft or calculated payroll.
///
/// Every active or on-leave employee hired by the end of the month gets a
/// base salary line, one line per applicable deduction and one per active
/// loan installment.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "id": "…",
///   "status": "CALCULATED",
///   "total_gross_cents": 900000,
///   "total_deductions_cents": 45000,
///   "total_net_cents": 855000,
///   "items": [ { "item_type": "BASE_SALARY", "amount_cents": 450000, "…": "…" } ]
/// }
/// ```
pub async fn calculate_payroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PayrollDetail>, AppError> {
    auth.require(permissions::PAYROLL_WRITE)?;
    Ok(Json(
        payroll_service::calculate_payroll(&state.ctx, &auth, id).await?,
    ))
}

pub async fn approve_payroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payroll>, AppError> {
    auth.require(permissions::PAYROLL_APPROVE)?;
    Ok(Json(
        payroll_service::approve_payroll(&state.ctx, &auth, id).await?,
    ))
}

/// Mark an approved payroll paid. Loan installments and deduction counters
/// advance in the same step.
pub async fn pay_payroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payroll>, AppError> {
    auth.require(permissions::PAYROLL_PAY)?;
    Ok(Json(payroll_service::pay_payroll(&state.ctx, &auth, id).await?))
}

pub async fn cancel_payroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payroll>, AppError> {
    auth.require(permissions::PAYROLL_WRITE)?;
    Ok(Json(
        payroll_service::cancel_payroll(&state.ctx, &auth, id).await?,
    ))
}
