//! Vacation periods: acquisition, scheduling, enjoyment and sale of days.

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
use crate::models::vacation::{
    CreateVacationPeriodRequest, RefreshResponse, ScheduleVacationRequest,
    SellVacationDaysRequest, VacationFilter, VacationPeriodResponse,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::vacation_service;

/// Open a vacation period for an employee.
///
/// # Request Body
///
/// ```json
/// { "employee_id": "…", "acquisition_start": "2024-03-01" }
/// ```
///
/// The period is `AVAILABLE` right away when its twelve-month acquisition
/// window has already ended, `PENDING` otherwise.
pub async fn create_period(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateVacationPeriodRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    let period = vacation_service::create_period(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn list_periods(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<VacationFilter>,
) -> Result<Json<PaginatedResponse<VacationPeriodResponse>>, AppError> {
    auth.require(permissions::VACATIONS_READ)?;
    let page = PageRequest::from(page);
    let periods = vacation_service::list_periods(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(periods, page)))
}

pub async fn get_period(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VacationPeriodResponse>, AppError> {
    auth.require(permissions::VACATIONS_READ)?;
    Ok(Json(vacation_service::get_period(&state.ctx, &auth, id).await?))
}

/// Schedule days off inside the concession window.
///
/// # Endpoint
///
/// `POST /v1/vacations/{id}/schedule`
///
/// # Request Body
///
/// ```json
/// { "start_date": "2025-07-01", "end_date": "2025-07-15" }
/// ```
///
/// # Response
///
/// - **200 OK**: the period, status `SCHEDULED`
/// - **400**: period not available, fewer than 5 days, more days than
///   remain, or a start outside the concession window
pub async fn schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ScheduleVacationRequest>,
) -> Result<Json<VacationPeriodResponse>, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    Ok(Json(
        vacation_service::schedule(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn cancel_schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VacationPeriodResponse>, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    Ok(Json(
        vacation_service::cancel_schedule(&state.ctx, &auth, id).await?,
    ))
}

pub async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VacationPeriodResponse>, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    Ok(Json(vacation_service::start(&state.ctx, &auth, id).await?))
}

/// Finish an in-progress vacation and consume its scheduled days.
pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VacationPeriodResponse>, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    Ok(Json(vacation_service::complete(&state.ctx, &auth, id).await?))
}

/// Sell up to a third of the period's days: `{ "days": 10 }`.
pub async fn sell_days(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<SellVacationDaysRequest>,
) -> Result<Json<VacationPeriodResponse>, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    Ok(Json(
        vacation_service::sell_days(&state.ctx, &auth, id, request).await?,
    ))
}

/// Move the tenant's periods along the calendar (available, expired).
pub async fn refresh(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<RefreshResponse>, AppError> {
    auth.require(permissions::VACATIONS_WRITE)?;
    Ok(Json(vacation_service::refresh_periods(&state.ctx, &auth).await?))
}
