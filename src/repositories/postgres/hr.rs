use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{PgStore, conflict_on_unique, limit_offset};
use crate::error::AppError;
use crate::models::absence::{Absence, AbsenceFilter};
use crate::models::employee::{Employee, EmployeeFilter};
use crate::models::loan::{Deduction, DeductionFilter, Loan, LoanFilter};
use crate::models::payroll::{Payroll, PayrollFilter, PayrollItem, PayrollStatus, settle_items};
use crate::models::vacation::{VacationFilter, VacationPeriod};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{
    AbsenceRepository, Change, EmployeeRepository, LoanRepository, PayrollRepository,
    VacationRepository,
};

const EMPLOYEE_COLUMNS: &str = "id, tenant_id, registration_number, full_name, email, position, \
    department, hire_date, base_salary_cents, status, termination_date, created_at, updated_at, deleted_at";

const ABSENCE_COLUMNS: &str = "id, tenant_id, employee_id, absence_type, start_date, end_date, \
    total_days, reason, document_url, status, requested_by, reviewed_by, reviewed_at, \
    rejection_reason, created_at, updated_at";

const VACATION_COLUMNS: &str = "id, tenant_id, employee_id, acquisition_start, acquisition_end, \
    concession_start, concession_end, total_days, used_days, sold_days, scheduled_start, \
    scheduled_end, status, notes, created_at, updated_at";

const PAYROLL_COLUMNS: &str = "id, tenant_id, reference_month, reference_year, status, \
    total_gross_cents, total_deductions_cents, total_net_cents, calculated_by, calculated_at, \
    approved_by, approved_at, paid_at, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, tenant_id, payroll_id, employee_id, item_type, description, amount_cents, is_deduction, reference_id";

const LOAN_COLUMNS: &str = "id, tenant_id, employee_id, description, principal_cents, \
    installment_count, installment_cents, paid_installments, outstanding_cents, status, \
    start_date, created_at, updated_at";

const DEDUCTION_COLUMNS: &str = "id, tenant_id, employee_id, name, amount_cents, is_recurring, \
    total_installments, applied_installments, effective_date, is_active, created_at, updated_at";

#[async_trait]
impl EmployeeRepository for PgStore {
    async fn create_employee(&self, employee: &Employee) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO employees (
                id, tenant_id, registration_number, full_name, email, position, department,
                hire_date, base_salary_cents, status, termination_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(employee.id)
        .bind(employee.tenant_id)
        .bind(&employee.registration_number)
        .bind(&employee.full_name)
        .bind(&employee.email)
        .bind(&employee.position)
        .bind(&employee.department)
        .bind(employee.hire_date)
        .bind(employee.base_salary_cents)
        .bind(employee.status)
        .bind(employee.termination_date)
        .bind(employee.created_at)
        .bind(employee.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Registration number already in use"))?;
        Ok(())
    }

    async fn find_employee(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Employee>, AppError> {
        Ok(sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_employee_by_registration(
        &self,
        tenant_id: Uuid,
        registration_number: &str,
    ) -> Result<Option<Employee>, AppError> {
        Ok(sqlx::query_as::<_, Employee>(&format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS} FROM employees
            WHERE tenant_id = $1 AND registration_number = $2 AND deleted_at IS NULL
            "#
        ))
        .bind(tenant_id)
        .bind(registration_number)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_employees(
        &self,
        tenant_id: Uuid,
        filter: &EmployeeFilter,
        page: PageRequest,
    ) -> Result<Page<Employee>, AppError> {
        const WHERE: &str =
            "tenant_id = $1 AND deleted_at IS NULL AND ($2::text IS NULL OR status = $2)";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM employees WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE {WHERE} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(tenant_id)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_employee(&self, employee: &Employee) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE employees
            SET full_name = $3, email = $4, position = $5, department = $6,
                base_salary_cents = $7, status = $8, termination_date = $9, updated_at = $10
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(employee.tenant_id)
        .bind(employee.id)
        .bind(&employee.full_name)
        .bind(&employee.email)
        .bind(&employee.position)
        .bind(&employee.department)
        .bind(employee.base_salary_cents)
        .bind(employee.status)
        .bind(employee.termination_date)
        .bind(employee.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_employee(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE employees SET deleted_at = NOW() WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_payable_employees(
        &self,
        tenant_id: Uuid,
        period_end: NaiveDate,
    ) -> Result<Vec<Employee>, AppError> {
        Ok(sqlx::query_as::<_, Employee>(&format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS} FROM employees
            WHERE tenant_id = $1
              AND deleted_at IS NULL
              AND status IN ('ACTIVE', 'ON_LEAVE')
              AND hire_date <= $2
            ORDER BY registration_number
            "#
        ))
        .bind(tenant_id)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl AbsenceRepository for PgStore {
    async fn insert_absence(&self, absence: &Absence) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent requests for the same employee
        sqlx::query("SELECT id FROM employees WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
            .bind(absence.tenant_id)
            .bind(absence.employee_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Employee"))?;

        let overlaps: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM absences
                WHERE tenant_id = $1 AND employee_id = $2
                  AND status IN ('PENDING', 'APPROVED')
                  AND start_date <= $4 AND end_date >= $3
            )
            "#,
        )
        .bind(absence.tenant_id)
        .bind(absence.employee_id)
        .bind(absence.start_date)
        .bind(absence.end_date)
        .fetch_one(&mut *tx)
        .await?;

        if overlaps {
            tx.rollback().await?;
            return Err(AppError::bad_request(
                "Absence overlaps another pending or approved absence",
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO absences (
                id, tenant_id, employee_id, absence_type, start_date, end_date, total_days,
                reason, document_url, status, requested_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(absence.id)
        .bind(absence.tenant_id)
        .bind(absence.employee_id)
        .bind(absence.absence_type)
        .bind(absence.start_date)
        .bind(absence.end_date)
        .bind(absence.total_days)
        .bind(&absence.reason)
        .bind(&absence.document_url)
        .bind(absence.status)
        .bind(absence.requested_by)
        .bind(absence.created_at)
        .bind(absence.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_absence(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Absence>, AppError> {
        Ok(sqlx::query_as::<_, Absence>(&format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_absences(
        &self,
        tenant_id: Uuid,
        filter: &AbsenceFilter,
        page: PageRequest,
    ) -> Result<Page<Absence>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::uuid IS NULL OR employee_id = $2) \
            AND ($3::text IS NULL OR status = $3) \
            AND ($4::text IS NULL OR absence_type = $4)";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM absences WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.employee_id)
            .bind(filter.status)
            .bind(filter.absence_type)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Absence>(&format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences WHERE {WHERE} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(tenant_id)
        .bind(filter.employee_id)
        .bind(filter.status)
        .bind(filter.absence_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_absence(&self, absence: &Absence) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE absences
            SET status = $3, reviewed_by = $4, reviewed_at = $5, rejection_reason = $6, updated_at = $7
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(absence.tenant_id)
        .bind(absence.id)
        .bind(absence.status)
        .bind(absence.reviewed_by)
        .bind(absence.reviewed_at)
        .bind(&absence.rejection_reason)
        .bind(absence.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VacationRepository for PgStore {
    async fn create_period(&self, period: &VacationPeriod) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO vacation_periods (
                id, tenant_id, employee_id, acquisition_start, acquisition_end,
                concession_start, concession_end, total_days, used_days, sold_days,
                status, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(period.id)
        .bind(period.tenant_id)
        .bind(period.employee_id)
        .bind(period.acquisition_start)
        .bind(period.acquisition_end)
        .bind(period.concession_start)
        .bind(period.concession_end)
        .bind(period.total_days)
        .bind(period.used_days)
        .bind(period.sold_days)
        .bind(period.status)
        .bind(&period.notes)
        .bind(period.created_at)
        .bind(period.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique(
            "A vacation period with this acquisition start already exists",
        ))?;
        Ok(())
    }

    async fn find_period(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<VacationPeriod>, AppError> {
        Ok(sqlx::query_as::<_, VacationPeriod>(&format!(
            "SELECT {VACATION_COLUMNS} FROM vacation_periods WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_periods(
        &self,
        tenant_id: Uuid,
        filter: &VacationFilter,
        page: PageRequest,
    ) -> Result<Page<VacationPeriod>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::uuid IS NULL OR employee_id = $2) \
            AND ($3::text IS NULL OR status = $3)";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM vacation_periods WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(filter.employee_id)
                .bind(filter.status)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, VacationPeriod>(&format!(
            "SELECT {VACATION_COLUMNS} FROM vacation_periods WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.employee_id)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn list_employee_periods(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Vec<VacationPeriod>, AppError> {
        Ok(sqlx::query_as::<_, VacationPeriod>(&format!(
            r#"
            SELECT {VACATION_COLUMNS} FROM vacation_periods
            WHERE tenant_id = $1 AND employee_id = $2
            ORDER BY acquisition_start
            "#
        ))
        .bind(tenant_id)
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_open_periods(&self, tenant_id: Uuid) -> Result<Vec<VacationPeriod>, AppError> {
        Ok(sqlx::query_as::<_, VacationPeriod>(&format!(
            r#"
            SELECT {VACATION_COLUMNS} FROM vacation_periods
            WHERE tenant_id = $1 AND status IN ('PENDING', 'AVAILABLE')
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_period(&self, period: &VacationPeriod) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE vacation_periods
            SET used_days = $3, sold_days = $4, scheduled_start = $5, scheduled_end = $6,
                status = $7, notes = $8, updated_at = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(period.tenant_id)
        .bind(period.id)
        .bind(period.used_days)
        .bind(period.sold_days)
        .bind(period.scheduled_start)
        .bind(period.scheduled_end)
        .bind(period.status)
        .bind(&period.notes)
        .bind(period.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PayrollRepository for PgStore {
    async fn create_payroll(&self, payroll: &Payroll) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO payrolls (id, tenant_id, reference_month, reference_year, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payroll.id)
        .bind(payroll.tenant_id)
        .bind(payroll.reference_month)
        .bind(payroll.reference_year)
        .bind(payroll.status)
        .bind(payroll.created_at)
        .bind(payroll.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A payroll for this month already exists"))?;
        Ok(())
    }

    async fn find_payroll(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Payroll>, AppError> {
        Ok(sqlx::query_as::<_, Payroll>(&format!(
            "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_payrolls(
        &self,
        tenant_id: Uuid,
        filter: &PayrollFilter,
        page: PageRequest,
    ) -> Result<Page<Payroll>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::int IS NULL OR reference_year = $2) \
            AND ($3::text IS NULL OR status = $3)";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM payrolls WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.reference_year)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Payroll>(&format!(
            "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE {WHERE} \
             ORDER BY reference_year DESC, reference_month DESC, created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.reference_year)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        payroll_id: Uuid,
    ) -> Result<Vec<PayrollItem>, AppError> {
        Ok(sqlx::query_as::<_, PayrollItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM payroll_items WHERE tenant_id = $1 AND payroll_id = $2 ORDER BY position"
        ))
        .bind(tenant_id)
        .bind(payroll_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_calculation(
        &self,
        payroll: &Payroll,
        items: &[PayrollItem],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let status: PayrollStatus = sqlx::query_scalar(
            "SELECT status FROM payrolls WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(payroll.tenant_id)
        .bind(payroll.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Payroll"))?;

        if !matches!(status, PayrollStatus::Draft | PayrollStatus::Calculated) {
            tx.rollback().await?;
            return Err(AppError::BadRequest(format!(
                "Payroll in status {status} cannot be calculated"
            )));
        }

        sqlx::query("DELETE FROM payroll_items WHERE tenant_id = $1 AND payroll_id = $2")
            .bind(payroll.tenant_id)
            .bind(payroll.id)
            .execute(&mut *tx)
            .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO payroll_items (
                    id, tenant_id, payroll_id, employee_id, item_type, description,
                    amount_cents, is_deduction, reference_id, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id)
            .bind(item.tenant_id)
            .bind(item.payroll_id)
            .bind(item.employee_id)
            .bind(item.item_type)
            .bind(&item.description)
            .bind(item.amount_cents)
            .bind(item.is_deduction)
            .bind(item.reference_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        write_payroll(&mut tx, payroll).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn modify_payroll(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Payroll>,
    ) -> Result<Payroll, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut payroll = sqlx::query_as::<_, Payroll>(&format!(
            "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Payroll"))?;
        change(&mut payroll)?;
        write_payroll(&mut tx, &payroll).await?;

        tx.commit().await?;
        Ok(payroll)
    }

    async fn settle_payroll(&self, tenant_id: Uuid, id: Uuid) -> Result<Payroll, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut payroll = sqlx::query_as::<_, Payroll>(&format!(
            "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Payroll"))?;
        payroll.pay()?;

        let items = sqlx::query_as::<_, PayrollItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM payroll_items WHERE tenant_id = $1 AND payroll_id = $2 ORDER BY position"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let references: Vec<Uuid> = items.iter().filter_map(|i| i.reference_id).collect();
        let mut loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE tenant_id = $1 AND id = ANY($2) FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(&references)
        .fetch_all(&mut *tx)
        .await?;
        let mut deductions = sqlx::query_as::<_, Deduction>(&format!(
            "SELECT {DEDUCTION_COLUMNS} FROM deductions WHERE tenant_id = $1 AND id = ANY($2) FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(&references)
        .fetch_all(&mut *tx)
        .await?;

        let (loan_ids, deduction_ids) = settle_items(&items, &mut loans, &mut deductions);

        for loan in loans.iter().filter(|l| loan_ids.contains(&l.id)) {
            write_loan(&mut tx, loan).await?;
        }
        for deduction in deductions.iter().filter(|d| deduction_ids.contains(&d.id)) {
            write_deduction(&mut tx, deduction).await?;
        }
        write_payroll(&mut tx, &payroll).await?;

        tx.commit().await?;
        Ok(payroll)
    }
}

async fn write_payroll(conn: &mut sqlx::PgConnection, payroll: &Payroll) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE payrolls
        SET status = $3, total_gross_cents = $4, total_deductions_cents = $5, total_net_cents = $6,
            calculated_by = $7, calculated_at = $8, approved_by = $9, approved_at = $10,
            paid_at = $11, cancelled_at = $12, updated_at = $13
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(payroll.tenant_id)
    .bind(payroll.id)
    .bind(payroll.status)
    .bind(payroll.total_gross_cents)
    .bind(payroll.total_deductions_cents)
    .bind(payroll.total_net_cents)
    .bind(payroll.calculated_by)
    .bind(payroll.calculated_at)
    .bind(payroll.approved_by)
    .bind(payroll.approved_at)
    .bind(payroll.paid_at)
    .bind(payroll.cancelled_at)
    .bind(payroll.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_loan(conn: &mut sqlx::PgConnection, loan: &Loan) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE loans
        SET paid_installments = $3, outstanding_cents = $4, status = $5, updated_at = $6
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(loan.tenant_id)
    .bind(loan.id)
    .bind(loan.paid_installments)
    .bind(loan.outstanding_cents)
    .bind(loan.status)
    .bind(loan.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_deduction(
    conn: &mut sqlx::PgConnection,
    deduction: &Deduction,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE deductions
        SET applied_installments = $3, is_active = $4, updated_at = $5
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(deduction.tenant_id)
    .bind(deduction.id)
    .bind(deduction.applied_installments)
    .bind(deduction.is_active)
    .bind(deduction.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl LoanRepository for PgStore {
    async fn create_loan(&self, loan: &Loan) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, tenant_id, employee_id, description, principal_cents, installment_count,
                installment_cents, paid_installments, outstanding_cents, status, start_date,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(loan.id)
        .bind(loan.tenant_id)
        .bind(loan.employee_id)
        .bind(&loan.description)
        .bind(loan.principal_cents)
        .bind(loan.installment_count)
        .bind(loan.installment_cents)
        .bind(loan.paid_installments)
        .bind(loan.outstanding_cents)
        .bind(loan.status)
        .bind(loan.start_date)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_loan(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Loan>, AppError> {
        Ok(sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_loans(
        &self,
        tenant_id: Uuid,
        filter: &LoanFilter,
        page: PageRequest,
    ) -> Result<Page<Loan>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::uuid IS NULL OR employee_id = $2) \
            AND ($3::text IS NULL OR status = $3)";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM loans WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.employee_id)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE {WHERE} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.employee_id)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn list_active_loans(&self, tenant_id: Uuid) -> Result<Vec<Loan>, AppError> {
        Ok(sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE tenant_id = $1 AND status = 'ACTIVE' ORDER BY created_at"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn modify_loan(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Loan>,
    ) -> Result<Loan, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Loan"))?;
        change(&mut loan)?;
        write_loan(&mut tx, &loan).await?;

        tx.commit().await?;
        Ok(loan)
    }

    async fn create_deduction(&self, deduction: &Deduction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO deductions (
                id, tenant_id, employee_id, name, amount_cents, is_recurring, total_installments,
                applied_installments, effective_date, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(deduction.id)
        .bind(deduction.tenant_id)
        .bind(deduction.employee_id)
        .bind(&deduction.name)
        .bind(deduction.amount_cents)
        .bind(deduction.is_recurring)
        .bind(deduction.total_installments)
        .bind(deduction.applied_installments)
        .bind(deduction.effective_date)
        .bind(deduction.is_active)
        .bind(deduction.created_at)
        .bind(deduction.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_deduction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Deduction>, AppError> {
        Ok(sqlx::query_as::<_, Deduction>(&format!(
            "SELECT {DEDUCTION_COLUMNS} FROM deductions WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_deductions(
        &self,
        tenant_id: Uuid,
        filter: &DeductionFilter,
        page: PageRequest,
    ) -> Result<Page<Deduction>, AppError> {
        const WHERE: &str = "tenant_id = $1 \
            AND ($2::uuid IS NULL OR employee_id = $2) \
            AND ($3::bool IS NULL OR is_active = $3)";
        let (limit, offset) = limit_offset(page);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM deductions WHERE {WHERE}"))
            .bind(tenant_id)
            .bind(filter.employee_id)
            .bind(filter.is_active)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Deduction>(&format!(
            "SELECT {DEDUCTION_COLUMNS} FROM deductions WHERE {WHERE} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(filter.employee_id)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn list_active_deductions(&self, tenant_id: Uuid) -> Result<Vec<Deduction>, AppError> {
        Ok(sqlx::query_as::<_, Deduction>(&format!(
            "SELECT {DEDUCTION_COLUMNS} FROM deductions WHERE tenant_id = $1 AND is_active = true ORDER BY created_at"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn modify_deduction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Deduction>,
    ) -> Result<Deduction, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut deduction = sqlx::query_as::<_, Deduction>(&format!(
            "SELECT {DEDUCTION_COLUMNS} FROM deductions WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Deduction"))?;
        change(&mut deduction)?;
        write_deduction(&mut tx, &deduction).await?;

        tx.commit().await?;
        Ok(deduction)
    }
}
