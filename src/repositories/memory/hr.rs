use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::MemoryStore;
use crate::error::AppError;
use crate::models::absence::{Absence, AbsenceFilter};
use crate::models::employee::{Employee, EmployeeFilter};
use crate::models::loan::{Deduction, DeductionFilter, Loan, LoanFilter, LoanStatus};
use crate::models::payroll::{Payroll, PayrollFilter, PayrollItem, PayrollStatus, settle_items};
use crate::models::vacation::{VacationFilter, VacationPeriod, VacationStatus};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{
    AbsenceRepository, Change, EmployeeRepository, LoanRepository, PayrollRepository,
    VacationRepository,
};

#[async_trait]
impl EmployeeRepository for MemoryStore {
    async fn create_employee(&self, employee: &Employee) -> Result<(), AppError> {
        self.employees.insert(employee.clone()).await;
        Ok(())
    }

    async fn find_employee(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Employee>, AppError> {
        Ok(self
            .employees
            .find(tenant_id, |e| e.id == id && e.deleted_at.is_none())
            .await)
    }

    async fn find_employee_by_registration(
        &self,
        tenant_id: Uuid,
        registration_number: &str,
    ) -> Result<Option<Employee>, AppError> {
        Ok(self
            .employees
            .find(tenant_id, |e| {
                e.registration_number == registration_number && e.deleted_at.is_none()
            })
            .await)
    }

    async fn list_employees(
        &self,
        tenant_id: Uuid,
        filter: &EmployeeFilter,
        page: PageRequest,
    ) -> Result<Page<Employee>, AppError> {
        Ok(self
            .employees
            .page(
                tenant_id,
                |e| e.deleted_at.is_none() && filter.status.is_none_or(|s| e.status == s),
                page,
            )
            .await)
    }

    async fn update_employee(&self, employee: &Employee) -> Result<(), AppError> {
        self.employees.replace(employee).await;
        Ok(())
    }

    async fn delete_employee(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let now = chrono::Utc::now();
        let changed = self
            .employees
            .update_where(tenant_id, |e| e.id == id && e.deleted_at.is_none(), |e| {
                e.deleted_at = Some(now)
            })
            .await;
        Ok(changed > 0)
    }

    async fn list_payable_employees(
        &self,
        tenant_id: Uuid,
        period_end: NaiveDate,
    ) -> Result<Vec<Employee>, AppError> {
        let mut employees = self
            .employees
            .filter(tenant_id, |e| {
                e.deleted_at.is_none() && e.is_employed() && e.hire_date <= period_end
            })
            .await;
        employees.sort_by(|a, b| a.registration_number.cmp(&b.registration_number));
        Ok(employees)
    }
}

#[async_trait]
impl AbsenceRepository for MemoryStore {
    async fn insert_absence(&self, absence: &Absence) -> Result<(), AppError> {
        let _tx = self.tx.lock().await;
        let clash = self
            .absences
            .find(absence.tenant_id, |a| {
                a.employee_id == absence.employee_id
                    && a.status.is_blocking()
                    && a.overlaps(absence.start_date, absence.end_date)
            })
            .await;
        if clash.is_some() {
            return Err(AppError::bad_request(
                "Absence overlaps another pending or approved absence",
            ));
        }
        self.absences.insert(absence.clone()).await;
        Ok(())
    }

    async fn find_absence(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Absence>, AppError> {
        Ok(self.absences.get(tenant_id, id).await)
    }

    async fn list_absences(
        &self,
        tenant_id: Uuid,
        filter: &AbsenceFilter,
        page: PageRequest,
    ) -> Result<Page<Absence>, AppError> {
        Ok(self
            .absences
            .page(
                tenant_id,
                |a| {
                    filter.employee_id.is_none_or(|id| a.employee_id == id)
                        && filter.status.is_none_or(|s| a.status == s)
                        && filter.absence_type.is_none_or(|t| a.absence_type == t)
                },
                page,
            )
            .await)
    }

    async fn update_absence(&self, absence: &Absence) -> Result<(), AppError> {
        self.absences.replace(absence).await;
        Ok(())
    }
}

#[async_trait]
impl VacationRepository for MemoryStore {
    async fn create_period(&self, period: &VacationPeriod) -> Result<(), AppError> {
        let _tx = self.tx.lock().await;
        let duplicate = self
            .vacations
            .find(period.tenant_id, |p| {
                p.employee_id == period.employee_id
                    && p.acquisition_start == period.acquisition_start
            })
            .await;
        if duplicate.is_some() {
            return Err(AppError::Conflict(
                "A vacation period with this acquisition start already exists".into(),
            ));
        }
        self.vacations.insert(period.clone()).await;
        Ok(())
    }

    async fn find_period(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<VacationPeriod>, AppError> {
        Ok(self.vacations.get(tenant_id, id).await)
    }

    async fn list_periods(
        &self,
        tenant_id: Uuid,
        filter: &VacationFilter,
        page: PageRequest,
    ) -> Result<Page<VacationPeriod>, AppError> {
        Ok(self
            .vacations
            .page(
                tenant_id,
                |p| {
                    filter.employee_id.is_none_or(|id| p.employee_id == id)
                        && filter.status.is_none_or(|s| p.status == s)
                },
                page,
            )
            .await)
    }

    async fn list_employee_periods(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Vec<VacationPeriod>, AppError> {
        let mut periods = self
            .vacations
            .filter(tenant_id, |p| p.employee_id == employee_id)
            .await;
        periods.sort_by_key(|p| p.acquisition_start);
        Ok(periods)
    }

    async fn list_open_periods(&self, tenant_id: Uuid) -> Result<Vec<VacationPeriod>, AppError> {
        Ok(self
            .vacations
            .filter(tenant_id, |p| {
                matches!(p.status, VacationStatus::Pending | VacationStatus::Available)
            })
            .await)
    }

    async fn update_period(&self, period: &VacationPeriod) -> Result<(), AppError> {
        self.vacations.replace(period).await;
        Ok(())
    }
}

#[async_trait]
impl PayrollRepository for MemoryStore {
    async fn create_payroll(&self, payroll: &Payroll) -> Result<(), AppError> {
        let _tx = self.tx.lock().await;
        let existing = self
            .payrolls
            .find(payroll.tenant_id, |p| {
                p.reference_month == payroll.reference_month
                    && p.reference_year == payroll.reference_year
                    && p.status != PayrollStatus::Cancelled
            })
            .await;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "A payroll for {:02}/{} already exists",
                payroll.reference_month, payroll.reference_year
            )));
        }
        self.payrolls.insert(payroll.clone()).await;
        Ok(())
    }

    async fn find_payroll(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Payroll>, AppError> {
        Ok(self.payrolls.get(tenant_id, id).await)
    }

    async fn list_payrolls(
        &self,
        tenant_id: Uuid,
        filter: &PayrollFilter,
        page: PageRequest,
    ) -> Result<Page<Payroll>, AppError> {
        Ok(self
            .payrolls
            .page(
                tenant_id,
                |p| {
                    filter.reference_year.is_none_or(|y| p.reference_year == y)
                        && filter.status.is_none_or(|s| p.status == s)
                },
                page,
            )
            .await)
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        payroll_id: Uuid,
    ) -> Result<Vec<PayrollItem>, AppError> {
        // insertion order
        let mut items = self
            .payroll_items
            .filter(tenant_id, |i| i.payroll_id == payroll_id)
            .await;
        items.reverse();
        Ok(items)
    }

    async fn save_calculation(
        &self,
        payroll: &Payroll,
        items: &[PayrollItem],
    ) -> Result<(), AppError> {
        let _tx = self.tx.lock().await;
        let current = self
            .payrolls
            .get(payroll.tenant_id, payroll.id)
            .await
            .ok_or(AppError::NotFound("Payroll"))?;
        if !matches!(
            current.status,
            PayrollStatus::Draft | PayrollStatus::Calculated
        ) {
            return Err(AppError::BadRequest(format!(
                "Payroll in status {} cannot be calculated",
                current.status
            )));
        }

        self.payroll_items
            .remove_where(payroll.tenant_id, |i| i.payroll_id == payroll.id)
            .await;
        self.payroll_items.insert_many(items.iter().cloned()).await;
        self.payrolls.replace(payroll).await;
        Ok(())
    }

    async fn modify_payroll(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Payroll>,
    ) -> Result<Payroll, AppError> {
        let _tx = self.tx.lock().await;
        let mut payroll = self
            .payrolls
            .get(tenant_id, id)
            .await
            .ok_or(AppError::NotFound("Payroll"))?;
        change(&mut payroll)?;
        self.payrolls.replace(&payroll).await;
        Ok(payroll)
    }

    async fn settle_payroll(&self, tenant_id: Uuid, id: Uuid) -> Result<Payroll, AppError> {
        let _tx = self.tx.lock().await;
        let mut payroll = self
            .payrolls
            .get(tenant_id, id)
            .await
            .ok_or(AppError::NotFound("Payroll"))?;
        payroll.pay()?;

        let items = self
            .payroll_items
            .filter(tenant_id, |i| i.payroll_id == id)
            .await;
        let mut loans = self
            .loans
            .filter(tenant_id, |l| l.status == LoanStatus::Active)
            .await;
        let mut deductions = self.deductions.filter(tenant_id, |d| d.is_active).await;

        let (loan_ids, deduction_ids) = settle_items(&items, &mut loans, &mut deductions);
        for loan in loans.iter().filter(|l| loan_ids.contains(&l.id)) {
            self.loans.replace(loan).await;
        }
        for deduction in deductions.iter().filter(|d| deduction_ids.contains(&d.id)) {
            self.deductions.replace(deduction).await;
        }
        self.payrolls.replace(&payroll).await;
        Ok(payroll)
    }
}

#[async_trait]
impl LoanRepository for MemoryStore {
    async fn create_loan(&self, loan: &Loan) -> Result<(), AppError> {
        self.loans.insert(loan.clone()).await;
        Ok(())
    }

    async fn find_loan(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Loan>, AppError> {
        Ok(self.loans.get(tenant_id, id).await)
    }

    async fn list_loans(
        &self,
        tenant_id: Uuid,
        filter: &LoanFilter,
        page: PageRequest,
    ) -> Result<Page<Loan>, AppError> {
        Ok(self
            .loans
            .page(
                tenant_id,
                |l| {
                    filter.employee_id.is_none_or(|id| l.employee_id == id)
                        && filter.status.is_none_or(|s| l.status == s)
                },
                page,
            )
            .await)
    }

    async fn list_active_loans(&self, tenant_id: Uuid) -> Result<Vec<Loan>, AppError> {
        Ok(self
            .loans
            .filter(tenant_id, |l| l.status == LoanStatus::Active)
            .await)
    }

    async fn modify_loan(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Loan>,
    ) -> Result<Loan, AppError> {
        let _tx = self.tx.lock().await;
        let mut loan = self
            .loans
            .get(tenant_id, id)
            .await
            .ok_or(AppError::NotFound("Loan"))?;
        change(&mut loan)?;
        self.loans.replace(&loan).await;
        Ok(loan)
    }

    async fn create_deduction(&self, deduction: &Deduction) -> Result<(), AppError> {
        self.deductions.insert(deduction.clone()).await;
        Ok(())
    }

    async fn find_deduction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Deduction>, AppError> {
        Ok(self.deductions.get(tenant_id, id).await)
    }

    async fn list_deductions(
        &self,
        tenant_id: Uuid,
        filter: &DeductionFilter,
        page: PageRequest,
    ) -> Result<Page<Deduction>, AppError> {
        Ok(self
            .deductions
            .page(
                tenant_id,
                |d| {
                    filter.employee_id.is_none_or(|id| d.employee_id == id)
                        && filter.is_active.is_none_or(|a| d.is_active == a)
                },
                page,
            )
            .await)
    }

    async fn list_active_deductions(&self, tenant_id: Uuid) -> Result<Vec<Deduction>, AppError> {
        Ok(self.deductions.filter(tenant_id, |d| d.is_active).await)
    }

    async fn modify_deduction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Deduction>,
    ) -> Result<Deduction, AppError> {
        let _tx = self.tx.lock().await;
        let mut deduction = self
            .deductions
            .get(tenant_id, id)
            .await
            .ok_or(AppError::NotFound("Deduction"))?;
        change(&mut deduction)?;
        self.deductions.replace(&deduction).await;
        Ok(deduction)
    }
}
