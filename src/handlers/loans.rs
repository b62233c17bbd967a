//! Employee loans and payroll deductions.

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
use crate::models::loan::{
    CreateDeductionRequest, CreateLoanRequest, Deduction, DeductionFilter, LoanFilter,
    LoanResponse,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::loan_service;

/// Grant a loan to an employee.
///
/// # Request Body
///
/// ```json
/// {
///   "employee_id": "…",
///   "description": "Laptop",
///   "principal_cents": 100000,
///   "installment_count": 3,
///   "start_date": "2025-01-01"
/// }
/// ```
///
/// # Response (201 Created)
///
/// The loan with `installment_cents` rounded up (`33334` above) and the
/// `next_installment_cents` payroll will charge.
pub async fn create_loan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateLoanRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::LOANS_WRITE)?;
    let loan = loan_service::create_loan(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

pub async fn list_loans(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<LoanFilter>,
) -> Result<Json<PaginatedResponse<LoanResponse>>, AppError> {
    auth.require(permissions::LOANS_READ)?;
    let page = PageRequest::from(page);
    let loans = loan_service::list_loans(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(loans, page)))
}

pub async fn get_loan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    auth.require(permissions::LOANS_READ)?;
    Ok(Json(loan_service::get_loan(&state.ctx, &auth, id).await?))
}

/// Pay one installment outside payroll.
pub async fn register_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    auth.require(permissions::LOANS_WRITE)?;
    Ok(Json(
        loan_service::register_payment(&state.ctx, &auth, id).await?,
    ))
}

pub async fn cancel_loan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    auth.require(permissions::LOANS_WRITE)?;
    Ok(Json(loan_service::cancel_loan(&state.ctx, &auth, id).await?))
}

/// Register a deduction.
///
/// Recurring deductions apply every month until deactivated or until
/// `total_installments` have been charged; one-off deductions apply once.
pub async fn create_deduction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateDeductionRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::DEDUCTIONS_WRITE)?;
    let deduction = loan_service::create_deduction(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(deduction)))
}

pub async fn list_deductions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<DeductionFilter>,
) -> Result<Json<PaginatedResponse<Deduction>>, AppError> {
    auth.require(permissions::DEDUCTIONS_READ)?;
    let page = PageRequest::from(page);
    let deductions = loan_service::list_deductions(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(deductions, page)))
}

pub async fn get_deduction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deduction>, AppError> {
    auth.require(permissions::DEDUCTIONS_READ)?;
    Ok(Json(
        loan_service::get_deduction(&state.ctx, &auth, id).await?,
    ))
}

pub async fn deactivate_deduction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deduction>, AppError> {
    auth.require(permissions::DEDUCTIONS_WRITE)?;
    Ok(Json(
        loan_service::deactivate_deduction(&state.ctx, &auth, id).await?,
    ))
}
