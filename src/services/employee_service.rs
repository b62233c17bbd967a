//! Employee records.

use chrono::Utc;
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::employee::{
    CreateEmployeeRequest, Employee, EmployeeFilter, EmployeeStatus, TerminateEmployeeRequest,
    UpdateEmployeeRequest,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "hr.employees";

fn ensure_salary(cents: i64) -> Result<(), AppError> {
    crate::money::ensure_positive("Base salary", cents)
}

pub async fn create_employee(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateEmployeeRequest,
) -> Result<Employee, AppError> {
    let registration_number = request.registration_number.trim().to_string();
    if registration_number.is_empty() {
        return Err(AppError::bad_request("Registration number is required"));
    }
    if request.full_name.trim().is_empty() {
        return Err(AppError::bad_request("Full name is required"));
    }
    ensure_salary(request.base_salary_cents)?;

    if ctx
        .repos
        .employees
        .find_employee_by_registration(auth.tenant_id, &registration_number)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Registration number already in use".into(),
        ));
    }

    let now = Utc::now();
    let employee = Employee {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        registration_number,
        full_name: request.full_name.trim().to_string(),
        email: request.email,
        position: request.position,
        department: request.department,
        hire_date: request.hire_date,
        base_salary_cents: request.base_salary_cents,
        status: EmployeeStatus::Active,
        termination_date: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    ctx.repos.employees.create_employee(&employee).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "employee",
            employee.id,
            format!("Employee {} hired", employee.registration_number),
        )
        .with_new(&employee),
    )
    .await;
    Ok(employee)
}

pub async fn get_employee(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Employee, AppError> {
    ctx.repos
        .employees
        .find_employee(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Employee"))
}

pub async fn list_employees(
    ctx: &Context,
    auth: &AuthContext,
    filter: &EmployeeFilter,
    page: PageRequest,
) -> Result<Page<Employee>, AppError> {
    ctx.repos
        .employees
        .list_employees(auth.tenant_id, filter, page)
        .await
}

pub async fn update_employee(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateEmployeeRequest,
) -> Result<Employee, AppError> {
    let mut employee = get_employee(ctx, auth, id).await?;
    let before = employee.clone();

    if let Some(full_name) = request.full_name {
        if full_name.trim().is_empty() {
            return Err(AppError::bad_request("Full name is required"));
        }
        employee.full_name = full_name.trim().to_string();
    }
    if let Some(email) = request.email {
        employee.email = Some(email);
    }
    if let Some(position) = request.position {
        employee.position = Some(position);
    }
    if let Some(department) = request.department {
        employee.department = Some(department);
    }
    if let Some(cents) = request.base_salary_cents {
        ensure_salary(cents)?;
        employee.base_salary_cents = cents;
    }
    if let Some(status) = request.status {
        if status == EmployeeStatus::Terminated {
            return Err(AppError::bad_request(
                "Use the terminate operation to end an employment",
            ));
        }
        if !employee.is_employed() {
            return Err(AppError::bad_request("Terminated employees cannot change status"));
        }
        employee.status = status;
    }
    employee.updated_at = Utc::now();
    ctx.repos.employees.update_employee(&employee).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "employee",
            employee.id,
            format!("Employee {} updated", employee.registration_number),
        )
        .with_old(&before)
        .with_new(&employee),
    )
    .await;
    Ok(employee)
}

pub async fn terminate_employee(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: TerminateEmployeeRequest,
) -> Result<Employee, AppError> {
    let mut employee = get_employee(ctx, auth, id).await?;
    employee.terminate(request.termination_date)?;
    ctx.repos.employees.update_employee(&employee).await?;

    tracing::info!(tenant_id = %auth.tenant_id, employee_id = %id, "Employee terminated");
    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "employee",
            employee.id,
            format!(
                "Employee {} terminated on {}",
                employee.registration_number, request.termination_date
            ),
        )
        .with_new(&employee),
    )
    .await;
    Ok(employee)
}

pub async fn delete_employee(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let employee = get_employee(ctx, auth, id).await?;
    ctx.repos.employees.delete_employee(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            MODULE,
            "employee",
            id,
            format!("Employee {} deleted", employee.registration_number),
        )
        .with_old(&employee),
    )
    .await;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::services::testing;

    pub fn hire(registration: &str, hire_date: NaiveDate, salary: i64) -> CreateEmployeeRequest {
        CreateEmployeeRequest {
            registration_number: registration.into(),
            full_name: format!("Employee {registration}"),
            email: None,
            position: None,
            department: None,
            hire_date,
            base_salary_cents: salary,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn registration_numbers_are_unique() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 300_000))
            .await
            .unwrap();
        let duplicate = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 300_000)).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let other_tenant = testing::admin(&ctx).await;
        assert!(
            create_employee(&ctx, &other_tenant, hire("E-1", date(2024, 1, 1), 300_000))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn salary_must_be_positive() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let result = create_employee(&ctx, &auth, hire("E-2", date(2024, 1, 1), 0)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn terminate_then_filter() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let a = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 300_000))
            .await
            .unwrap();
        create_employee(&ctx, &auth, hire("E-2", date(2024, 1, 1), 300_000))
            .await
            .unwrap();

        let early = terminate_employee(
            &ctx,
            &auth,
            a.id,
            TerminateEmployeeRequest {
                termination_date: date(2023, 12, 31),
            },
        )
        .await;
        assert!(matches!(early, Err(AppError::BadRequest(_))));

        terminate_employee(
            &ctx,
            &auth,
            a.id,
            TerminateEmployeeRequest {
                termination_date: date(2025, 6, 30),
            },
        )
        .await
        .unwrap();

        let active = list_employees(
            &ctx,
            &auth,
            &EmployeeFilter {
                status: Some(EmployeeStatus::Active),
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(active.total, 1);
        assert_eq!(active.items[0].registration_number, "E-2");
    }

    #[tokio::test]
    async fn update_cannot_terminate() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let e = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 300_000))
            .await
            .unwrap();

        let result = update_employee(
            &ctx,
            &auth,
            e.id,
            UpdateEmployeeRequest {
                full_name: None,
                email: None,
                position: None,
                department: None,
                base_salary_cents: None,
                status: Some(EmployeeStatus::Terminated),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn deleted_employees_disappear() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let e = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 300_000))
            .await
            .unwrap();
        delete_employee(&ctx, &auth, e.id).await.unwrap();
        assert!(matches!(
            get_employee(&ctx, &auth, e.id).await,
            Err(AppError::NotFound("Employee"))
        ));
    }
}
