//! Vacation entitlement periods.
//!
//! Periods also move with the calendar (PENDING → AVAILABLE → EXPIRED).
//! Every operation refreshes the period it loads, and `refresh_periods`
//! sweeps the whole tenant.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::Context;
use super::employee_service::get_employee;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::vacation::{
    CreateVacationPeriodRequest, RefreshResponse, ScheduleVacationRequest,
    SellVacationDaysRequest, VacationBalance, VacationFilter, VacationPeriod,
    VacationPeriodResponse,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "hr.vacations";

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub async fn create_period(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateVacationPeriodRequest,
) -> Result<VacationPeriodResponse, AppError> {
    let employee = get_employee(ctx, auth, request.employee_id).await?;
    if request.acquisition_start < employee.hire_date {
        return Err(AppError::bad_request(
            "Acquisition period cannot start before the hire date",
        ));
    }

    let existing = ctx
        .repos
        .vacations
        .list_employee_periods(auth.tenant_id, employee.id)
        .await?;
    if existing
        .iter()
        .any(|p| p.acquisition_start == request.acquisition_start)
    {
        return Err(AppError::Conflict(
            "A vacation period with this acquisition start already exists".into(),
        ));
    }

    let period = VacationPeriod::open(
        auth.tenant_id,
        employee.id,
        request.acquisition_start,
        request.notes,
        today(),
    )?;
    ctx.repos.vacations.create_period(&period).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "vacation_period",
            period.id,
            format!(
                "Vacation period {} to {} opened",
                period.acquisition_start, period.acquisition_end
            ),
        )
        .with_new(&period),
    )
    .await;
    Ok(period.into())
}

/// Load a period with its date-driven status brought up to date.
async fn load_current(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VacationPeriod, AppError> {
    let mut period = ctx
        .repos
        .vacations
        .find_period(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Vacation period"))?;
    if period.refresh(today()) {
        ctx.repos.vacations.update_period(&period).await?;
    }
    Ok(period)
}

pub async fn get_period(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VacationPeriodResponse, AppError> {
    Ok(load_current(ctx, auth, id).await?.into())
}

pub async fn list_periods(
    ctx: &Context,
    auth: &AuthContext,
    filter: &VacationFilter,
    page: PageRequest,
) -> Result<Page<VacationPeriodResponse>, AppError> {
    let periods = ctx
        .repos
        .vacations
        .list_periods(auth.tenant_id, filter, page)
        .await?;
    Ok(periods.map(Into::into))
}

/// Apply a state change to a period and persist it.
async fn transition(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    action: AuditAction,
    description: &str,
    change: impl FnOnce(&mut VacationPeriod) -> Result<(), AppError>,
) -> Result<VacationPeriodResponse, AppError> {
    let mut period = load_current(ctx, auth, id).await?;
    let before = period.clone();
    change(&mut period)?;
    ctx.repos.vacations.update_period(&period).await?;

    ctx.audit(
        auth,
        AuditEntry::new(action, MODULE, "vacation_period", period.id, description)
            .with_old(&before)
            .with_new(&period),
    )
    .await;
    Ok(period.into())
}

pub async fn schedule(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: ScheduleVacationRequest,
) -> Result<VacationPeriodResponse, AppError> {
    transition(ctx, auth, id, AuditAction::Update, "Vacation scheduled", |p| {
        p.schedule(request.start_date, request.end_date)
    })
    .await
}

pub async fn cancel_schedule(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VacationPeriodResponse, AppError> {
    transition(
        ctx,
        auth,
        id,
        AuditAction::Cancel,
        "Vacation schedule cancelled",
        VacationPeriod::cancel_schedule,
    )
    .await
}

pub async fn start(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VacationPeriodResponse, AppError> {
    transition(ctx, auth, id, AuditAction::Update, "Vacation started", VacationPeriod::start).await
}

pub async fn complete(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VacationPeriodResponse, AppError> {
    transition(
        ctx,
        auth,
        id,
        AuditAction::Update,
        "Vacation completed",
        VacationPeriod::complete,
    )
    .await
}

pub async fn sell_days(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: SellVacationDaysRequest,
) -> Result<VacationPeriodResponse, AppError> {
    transition(ctx, auth, id, AuditAction::Update, "Vacation days sold", |p| {
        p.sell_days(request.days)
    })
    .await
}

/// Move every open period of the tenant along the calendar.
pub async fn refresh_periods(
    ctx: &Context,
    auth: &AuthContext,
) -> Result<RefreshResponse, AppError> {
    let today = today();
    let mut updated = 0;
    for mut period in ctx.repos.vacations.list_open_periods(auth.tenant_id).await? {
        if period.refresh(today) {
            ctx.repos.vacations.update_period(&period).await?;
            updated += 1;
        }
    }

    tracing::info!(tenant_id = %auth.tenant_id, updated, "Vacation periods refreshed");
    Ok(RefreshResponse { updated })
}

pub async fn balance(
    ctx: &Context,
    auth: &AuthContext,
    employee_id: Uuid,
) -> Result<VacationBalance, AppError> {
    let employee = get_employee(ctx, auth, employee_id).await?;
    let today = today();
    let mut periods = ctx
        .repos
        .vacations
        .list_employee_periods(auth.tenant_id, employee.id)
        .await?;
    for period in periods.iter_mut() {
        if period.refresh(today) {
            ctx.repos.vacations.update_period(period).await?;
        }
    }
    Ok(VacationBalance::compute(employee.id, periods))
}
