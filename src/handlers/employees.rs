//! Employee records.

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
use crate::models::employee::{
    CreateEmployeeRequest, Employee, EmployeeFilter, TerminateEmployeeRequest,
    UpdateEmployeeRequest,
};
use crate::models::vacation::VacationBalance;
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::{employee_service, vacation_service};

/// Register an employee.
///
/// # Endpoint
///
/// `POST /v1/employees`
///
/// # Request Body
///
/// ```json
/// {
///   "registration_number": "EMP-0042",
///   "full_name": "Ana Souza",
///   "email": "ana@acme.test",
///   "position": "Analyst",
///   "department": "Finance",
///   "hire_date": "2024-03-01",
///   "base_salary_cents": 450000
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the employee, status `ACTIVE`
/// - **400**: invalid fields
/// - **409**: registration number already used in the tenant
pub async fn create_employee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::EMPLOYEES_WRITE)?;
    let employee = employee_service::create_employee(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

/// List employees, optionally filtered by `?status=`.
pub async fn list_employees(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<EmployeeFilter>,
) -> Result<Json<PaginatedResponse<Employee>>, AppError> {
    auth.require(permissions::EMPLOYEES_READ)?;
    let page = PageRequest::from(page);
    let employees = employee_service::list_employees(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(employees, page)))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Employee>, AppError> {
    auth.require(permissions::EMPLOYEES_READ)?;
    Ok(Json(
        employee_service::get_employee(&state.ctx, &auth, id).await?,
    ))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> Result<Json<Employee>, AppError> {
    auth.require(permissions::EMPLOYEES_WRITE)?;
    Ok(Json(
        employee_service::update_employee(&state.ctx, &auth, id, request).await?,
    ))
}

/// Terminate an employment contract.
///
/// `POST /v1/employees/{id}/terminate` with `{ "termination_date": "2025-06-30" }`.
/// The date cannot precede the hire date; terminating twice returns 400.
pub async fn terminate_employee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<TerminateEmployeeRequest>,
) -> Result<Json<Employee>, AppError> {
    auth.require(permissions::EMPLOYEES_WRITE)?;
    Ok(Json(
        employee_service::terminate_employee(&state.ctx, &auth, id, request).await?,
    ))
}

/// Soft delete.
pub async fn delete_employee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::EMPLOYEES_WRITE)?;
    employee_service::delete_employee(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Vacation days still available across all of the employee's periods.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "employee_id": "…",
///   "available_days": 20,
///   "periods": [ { "id": "…", "status": "AVAILABLE", "remaining_days": 20 } ]
/// }
/// ```
pub async fn vacation_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VacationBalance>, AppError> {
    auth.require(permissions::VACATIONS_READ)?;
    Ok(Json(vacation_service::balance(&state.ctx, &auth, id).await?))
}
