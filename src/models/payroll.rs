//! Monthly payroll runs and their line items.
//!
//! # Lifecycle
//!
//! ```text
//! DRAFT ──calculate──► CALCULATED ──approve──► APPROVED ──pay──► PAID
//!   │                    │  ▲ (recalculate)       │
//!   └────────────────────┴──┴────cancel───────────┴──► CANCELLED
//! ```

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::loan::{Deduction, Loan, LoanStatus};

string_enum! {
    pub enum PayrollStatus {
        Draft => "DRAFT",
        Calculated => "CALCULATED",
        Approved => "APPROVED",
        Paid => "PAID",
        Cancelled => "CANCELLED",
    }
}

string_enum! {
    pub enum PayrollItemType {
        BaseSalary => "BASE_SALARY",
        Deduction => "DEDUCTION",
        LoanInstallment => "LOAN_INSTALLMENT",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payroll {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub reference_month: i32,
    pub reference_year: i32,
    pub status: PayrollStatus,
    pub total_gross_cents: i64,
    pub total_deductions_cents: i64,
    pub total_net_cents: i64,
    pub calculated_by: Option<Uuid>,
    pub calculated_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayrollItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub payroll_id: Uuid,
    pub employee_id: Uuid,
    pub item_type: PayrollItemType,
    pub description: String,
    pub amount_cents: i64,
    pub is_deduction: bool,
    /// Loan or deduction this line settles.
    pub reference_id: Option<Uuid>,
}

tenant_record!(Payroll, PayrollItem);

impl Payroll {
    pub fn new(tenant_id: Uuid, month: i32, year: i32) -> Result<Self, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::bad_request("Reference month must be between 1 and 12"));
        }
        if !(2000..=2100).contains(&year) {
            return Err(AppError::bad_request(
                "Reference year must be between 2000 and 2100",
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            reference_month: month,
            reference_year: year,
            status: PayrollStatus::Draft,
            total_gross_cents: 0,
            total_deductions_cents: 0,
            total_net_cents: 0,
            calculated_by: None,
            calculated_at: None,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Last calendar day of the reference month.
    pub fn period_end(&self) -> NaiveDate {
        let (year, month) = if self.reference_month == 12 {
            (self.reference_year + 1, 1)
        } else {
            (self.reference_year, self.reference_month + 1)
        };
        NaiveDate::from_ymd_opt(year, month as u32, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// First calendar day of the reference month.
    pub fn period_start(&self) -> NaiveDate {
        let end = self.period_end();
        end.with_day(1).unwrap_or(end)
    }

    /// Store calculated items' totals. Allowed from DRAFT or CALCULATED (recalculation).
    pub fn apply_calculation(&mut self, items: &[PayrollItem], by: Uuid) -> Result<(), AppError> {
        if !matches!(self.status, PayrollStatus::Draft | PayrollStatus::Calculated) {
            return Err(AppError::BadRequest(format!(
                "Payroll in status {} cannot be calculated",
                self.status
            )));
        }

        let gross: i64 = items
            .iter()
            .filter(|i| !i.is_deduction)
            .map(|i| i.amount_cents)
            .sum();
        let deductions: i64 = items
            .iter()
            .filter(|i| i.is_deduction)
            .map(|i| i.amount_cents)
            .sum();

        let now = Utc::now();
        self.total_gross_cents = gross;
        self.total_deductions_cents = deductions;
        self.total_net_cents = gross - deductions;
        self.calculated_by = Some(by);
        self.calculated_at = Some(now);
        self.status = PayrollStatus::Calculated;
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(&mut self, by: Uuid) -> Result<(), AppError> {
        if self.status != PayrollStatus::Calculated {
            return Err(AppError::bad_request(
                "Only calculated payrolls can be approved",
            ));
        }
        let now = Utc::now();
        self.status = PayrollStatus::Approved;
        self.approved_by = Some(by);
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn pay(&mut self) -> Result<(), AppError> {
        if self.status != PayrollStatus::Approved {
            return Err(AppError::bad_request("Only approved payrolls can be paid"));
        }
        let now = Utc::now();
        self.status = PayrollStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        match self.status {
            PayrollStatus::Paid => Err(AppError::bad_request("Paid payrolls cannot be cancelled")),
            PayrollStatus::Cancelled => {
                Err(AppError::bad_request("Payroll is already cancelled"))
            }
            _ => {
                let now = Utc::now();
                self.status = PayrollStatus::Cancelled;
                self.cancelled_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
        }
    }
}

impl PayrollItem {
    pub fn new(
        payroll: &Payroll,
        employee_id: Uuid,
        item_type: PayrollItemType,
        description: String,
        amount_cents: i64,
        reference_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: payroll.tenant_id,
            payroll_id: payroll.id,
            employee_id,
            item_type,
            description,
            amount_cents,
            is_deduction: item_type != PayrollItemType::BaseSalary,
            reference_id,
        }
    }
}

/// Apply a paid payroll to the loans and deductions its items reference.
///
/// Each LOAN_INSTALLMENT item registers one payment on its loan and each
/// DEDUCTION item advances its deduction. Loans that were cancelled or paid
/// off since the calculation are left untouched. Returns the ids of the rows
/// that changed.
pub fn settle_items(
    items: &[PayrollItem],
    loans: &mut [Loan],
    deductions: &mut [Deduction],
) -> (Vec<Uuid>, Vec<Uuid>) {
    let mut touched_loans = Vec::new();
    let mut touched_deductions = Vec::new();

    for item in items {
        let Some(reference) = item.reference_id else {
            continue;
        };
        match item.item_type {
            PayrollItemType::LoanInstallment => {
                if let Some(loan) = loans
                    .iter_mut()
                    .find(|l| l.id == reference && l.status == LoanStatus::Active)
                {
                    if loan.register_payment().is_ok() {
                        touched_loans.push(loan.id);
                    }
                }
            }
            PayrollItemType::Deduction => {
                if let Some(deduction) = deductions
                    .iter_mut()
                    .find(|d| d.id == reference && d.is_active)
                {
                    deduction.advance();
                    touched_deductions.push(deduction.id);
                }
            }
            PayrollItemType::BaseSalary => {}
        }
    }

    (touched_loans, touched_deductions)
}

#[derive(Debug, Serialize)]
pub struct PayrollDetail {
    #[serde(flatten)]
    pub payroll: Payroll,
    pub items: Vec<PayrollItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePayrollRequest {
    pub reference_month: i32,
    pub reference_year: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayrollFilter {
    pub reference_year: Option<i32>,
    pub status: Option<PayrollStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payroll() -> Payroll {
        Payroll::new(Uuid::new_v4(), 2, 2024).unwrap()
    }

    #[test]
    fn rejects_invalid_reference() {
        assert!(Payroll::new(Uuid::new_v4(), 13, 2024).is_err());
        assert!(Payroll::new(Uuid::new_v4(), 0, 2024).is_err());
        assert!(Payroll::new(Uuid::new_v4(), 5, 1999).is_err());
    }

    #[test]
    fn period_bounds() {
        let p = payroll();
        assert_eq!(p.period_start(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(p.period_end(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let december = Payroll::new(Uuid::new_v4(), 12, 2024).unwrap();
        assert_eq!(
            december.period_end(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn calculation_totals() {
        let mut p = payroll();
        let employee = Uuid::new_v4();
        let items = vec![
            PayrollItem::new(&p, employee, PayrollItemType::BaseSalary, "Salary".into(), 500_000, None),
            PayrollItem::new(&p, employee, PayrollItemType::Deduction, "Union".into(), 5_000, None),
            PayrollItem::new(&p, employee, PayrollItemType::LoanInstallment, "Loan".into(), 20_000, None),
        ];
        p.apply_calculation(&items, Uuid::new_v4()).unwrap();
        assert_eq!(p.total_gross_cents, 500_000);
        assert_eq!(p.total_deductions_cents, 25_000);
        assert_eq!(p.total_net_cents, 475_000);
        assert_eq!(p.status, PayrollStatus::Calculated);

        // recalculation is allowed
        p.apply_calculation(&items[..1], Uuid::new_v4()).unwrap();
        assert_eq!(p.total_net_cents, 500_000);
    }

    #[test]
    fn transitions_follow_the_lifecycle() {
        let mut p = payroll();
        let user = Uuid::new_v4();
        assert!(p.approve(user).is_err());
        assert!(p.pay().is_err());

        p.apply_calculation(&[], user).unwrap();
        p.approve(user).unwrap();
        assert!(p.apply_calculation(&[], user).is_err());
        p.pay().unwrap();
        assert_eq!(p.status, PayrollStatus::Paid);
        assert!(p.cancel().is_err());
    }

    #[test]
    fn cancel_from_open_states() {
        let mut draft = payroll();
        draft.cancel().unwrap();
        assert_eq!(draft.status, PayrollStatus::Cancelled);
        assert!(draft.cancel().is_err());

        let mut approved = payroll();
        approved.apply_calculation(&[], Uuid::new_v4()).unwrap();
        approved.approve(Uuid::new_v4()).unwrap();
        approved.cancel().unwrap();
        assert!(approved.cancelled_at.is_some());
    }

    #[test]
    fn settlement_pays_loans_and_advances_deductions() {
        use crate::models::loan::{CreateDeductionRequest, CreateLoanRequest};

        let p = payroll();
        let employee = Uuid::new_v4();
        let loan = Loan::new(
            p.tenant_id,
            CreateLoanRequest {
                employee_id: employee,
                description: "Advance".into(),
                principal_cents: 30_000,
                installment_count: 3,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
        )
        .unwrap();
        let deduction = Deduction::new(
            p.tenant_id,
            CreateDeductionRequest {
                employee_id: employee,
                name: "Fine".into(),
                amount_cents: 1_000,
                is_recurring: false,
                total_installments: None,
                effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
        )
        .unwrap();
        let items = vec![
            PayrollItem::new(&p, employee, PayrollItemType::BaseSalary, "Salary".into(), 100_000, None),
            PayrollItem::new(&p, employee, PayrollItemType::LoanInstallment, "Loan".into(), 10_000, Some(loan.id)),
            PayrollItem::new(&p, employee, PayrollItemType::Deduction, "Fine".into(), 1_000, Some(deduction.id)),
        ];

        let mut loans = vec![loan];
        let mut deductions = vec![deduction];
        let (l, d) = settle_items(&items, &mut loans, &mut deductions);
        assert_eq!(l.len(), 1);
        assert_eq!(d.len(), 1);
        assert_eq!(loans[0].outstanding_cents, 20_000);
        assert!(!deductions[0].is_active);
    }
}
