//! Employee loans and payroll deductions.
//!
//! Both are settled through payroll: a loan contributes one installment per
//! paid payroll, a deduction contributes its fixed amount.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_INSTALLMENTS: i32 = 120;

string_enum! {
    pub enum LoanStatus {
        Active => "ACTIVE",
        Paid => "PAID",
        Cancelled => "CANCELLED",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Loan {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub description: String,
    pub principal_cents: i64,
    pub installment_count: i32,
    pub installment_cents: i64,
    pub paid_installments: i32,
    pub outstanding_cents: i64,
    pub status: LoanStatus,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Deduction {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub is_recurring: bool,
    /// Recurring deductions stop after this many payrolls; `None` means indefinitely.
    pub total_installments: Option<i32>,
    pub applied_installments: i32,
    pub effective_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

tenant_record!(Loan, Deduction);

impl Loan {
    pub fn new(
        tenant_id: Uuid,
        request: CreateLoanRequest,
    ) -> Result<Self, AppError> {
        crate::money::ensure_positive("Loan amount", request.principal_cents)?;
        if !(1..=MAX_INSTALLMENTS).contains(&request.installment_count) {
            return Err(AppError::BadRequest(format!(
                "Installment count must be between 1 and {MAX_INSTALLMENTS}"
            )));
        }

        let count = i64::from(request.installment_count);
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            employee_id: request.employee_id,
            description: request.description,
            principal_cents: request.principal_cents,
            installment_count: request.installment_count,
            // ceiling division: the last installment absorbs the difference
            installment_cents: request.principal_cents / count
                + i64::from(request.principal_cents % count != 0),
            paid_installments: 0,
            outstanding_cents: request.principal_cents,
            status: LoanStatus::Active,
            start_date: request.start_date,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn next_installment_cents(&self) -> i64 {
        self.installment_cents.min(self.outstanding_cents)
    }

    /// Settle one installment. Returns the amount settled.
    pub fn register_payment(&mut self) -> Result<i64, AppError> {
        if self.status != LoanStatus::Active {
            return Err(AppError::BadRequest(format!(
                "Loan in status {} cannot receive payments",
                self.status
            )));
        }

        let amount = self.next_installment_cents();
        self.outstanding_cents -= amount;
        self.paid_installments += 1;
        if self.outstanding_cents == 0 {
            self.status = LoanStatus::Paid;
        }
        self.updated_at = Utc::now();
        Ok(amount)
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        if self.status != LoanStatus::Active {
            return Err(AppError::bad_request("Only active loans can be cancelled"));
        }
        self.status = LoanStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Deduction {
    pub fn new(tenant_id: Uuid, request: CreateDeductionRequest) -> Result<Self, AppError> {
        crate::money::ensure_positive("Deduction amount", request.amount_cents)?;
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Deduction name is required"));
        }
        if let Some(total) = request.total_installments {
            if total < 1 {
                return Err(AppError::bad_request(
                    "Total installments must be at least 1",
                ));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            employee_id: request.employee_id,
            name: request.name,
            amount_cents: request.amount_cents,
            is_recurring: request.is_recurring,
            total_installments: request.total_installments,
            applied_installments: 0,
            effective_date: request.effective_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Should this deduction appear on a payroll ending at `period_end`?
    pub fn applies_to(&self, period_end: NaiveDate) -> bool {
        if !self.is_active || self.effective_date > period_end {
            return false;
        }
        self.is_recurring || self.applied_installments == 0
    }

    /// Record that one payroll settled this deduction.
    pub fn advance(&mut self) {
        self.applied_installments += 1;
        let exhausted = match (self.is_recurring, self.total_installments) {
            (false, _) => true,
            (true, Some(total)) => self.applied_installments >= total,
            (true, None) => false,
        };
        if exhausted {
            self.is_active = false;
        }
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::bad_request("Deduction is already inactive"));
        }
        self.is_active = false;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct LoanResponse {
    #[serde(flatten)]
    pub loan: Loan,
    pub next_installment_cents: i64,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        let next_installment_cents = if loan.status == LoanStatus::Active {
            loan.next_installment_cents()
        } else {
            0
        };
        Self {
            loan,
            next_installment_cents,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLoanRequest {
    pub employee_id: Uuid,
    pub description: String,
    pub principal_cents: i64,
    pub installment_count: i32,
    pub start_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeductionRequest {
    pub employee_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub is_recurring: bool,
    pub total_installments: Option<i32>,
    pub effective_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoanFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeductionFilter {
    pub employee_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(principal: i64, count: i32) -> Loan {
        Loan::new(
            Uuid::new_v4(),
            CreateLoanRequest {
                employee_id: Uuid::new_v4(),
                description: "Advance".into(),
                principal_cents: principal,
                installment_count: count,
                start_date: date(2024, 1, 1),
            },
        )
        .unwrap()
    }

    fn deduction(recurring: bool, total: Option<i32>) -> Deduction {
        Deduction::new(
            Uuid::new_v4(),
            CreateDeductionRequest {
                employee_id: Uuid::new_v4(),
                name: "Health plan".into(),
                amount_cents: 12_000,
                is_recurring: recurring,
                total_installments: total,
                effective_date: date(2024, 2, 1),
            },
        )
        .unwrap()
    }

    #[test]
    fn installment_rounds_up_and_last_absorbs_remainder() {
        let mut l = loan(1_000, 3);
        assert_eq!(l.installment_cents, 334);
        assert_eq!(l.register_payment().unwrap(), 334);
        assert_eq!(l.register_payment().unwrap(), 334);
        assert_eq!(l.next_installment_cents(), 332);
        assert_eq!(l.register_payment().unwrap(), 332);
        assert_eq!(l.status, LoanStatus::Paid);
        assert_eq!(l.paid_installments, 3);
        assert!(l.register_payment().is_err());
    }

    #[test]
    fn loan_validation() {
        let base = || CreateLoanRequest {
            employee_id: Uuid::new_v4(),
            description: "x".into(),
            principal_cents: 100,
            installment_count: 1,
            start_date: date(2024, 1, 1),
        };
        assert!(Loan::new(Uuid::new_v4(), CreateLoanRequest { principal_cents: 0, ..base() }).is_err());
        assert!(Loan::new(Uuid::new_v4(), CreateLoanRequest { installment_count: 0, ..base() }).is_err());
        assert!(Loan::new(Uuid::new_v4(), CreateLoanRequest { installment_count: 121, ..base() }).is_err());
    }

    #[test]
    fn oversized_principal_is_rejected() {
        let err = Loan::new(
            Uuid::new_v4(),
            CreateLoanRequest {
                employee_id: Uuid::new_v4(),
                description: "x".into(),
                principal_cents: i64::MAX,
                installment_count: 3,
                start_date: date(2024, 1, 1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let l = loan(crate::money::MAX_CENTS, 3);
        assert_eq!(l.installment_cents, 333_333_333_334);
    }

    #[test]
    fn cancelled_loan_rejects_payments() {
        let mut l = loan(1_000, 2);
        l.cancel().unwrap();
        assert!(l.register_payment().is_err());
        assert!(l.cancel().is_err());
    }

    #[test]
    fn one_off_deduction_applies_once() {
        let mut d = deduction(false, None);
        assert!(!d.applies_to(date(2024, 1, 31)));
        assert!(d.applies_to(date(2024, 2, 29)));
        d.advance();
        assert!(!d.is_active);
        assert!(!d.applies_to(date(2024, 3, 31)));
    }

    #[test]
    fn recurring_deduction_stops_after_installments() {
        let mut d = deduction(true, Some(2));
        d.advance();
        assert!(d.applies_to(date(2024, 3, 31)));
        d.advance();
        assert!(!d.is_active);
    }

    #[test]
    fn open_ended_recurring_deduction_keeps_going() {
        let mut d = deduction(true, None);
        for _ in 0..24 {
            d.advance();
        }
        assert!(d.is_active);
    }
}
