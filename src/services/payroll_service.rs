//! Monthly payroll runs.
//!
//! # Calculation
//!
//! For every employee on the payroll of the month (active or on leave, hired
//! on or before its last day):
//! - one BASE_SALARY item
//! - one DEDUCTION item per deduction that applies to the month
//! - one LOAN_INSTALLMENT item per active loan started by the month's end
//!
//! Paying a payroll settles the loans and deductions its items reference.

use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::employee::Employee;
use crate::models::loan::{Deduction, Loan};
use crate::models::payroll::{
    CreatePayrollRequest, Payroll, PayrollDetail, PayrollFilter, PayrollItem, PayrollItemType,
};
use crate::models::webhook::events;
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "hr.payroll";

pub async fn create_payroll(
    ctx: &Context,
    auth: &AuthContext,
    request: CreatePayrollRequest,
) -> Result<Payroll, AppError> {
    let payroll = Payroll::new(auth.tenant_id, request.reference_month, request.reference_year)?;
    ctx.repos.payrolls.create_payroll(&payroll).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "payroll",
            payroll.id,
            format!(
                "Payroll {:02}/{} opened",
                payroll.reference_month, payroll.reference_year
            ),
        ),
    )
    .await;
    Ok(payroll)
}

async fn find_payroll(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Payroll, AppError> {
    ctx.repos
        .payrolls
        .find_payroll(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Payroll"))
}

pub async fn get_payroll(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<PayrollDetail, AppError> {
    let payroll = find_payroll(ctx, auth, id).await?;
    let items = ctx.repos.payrolls.list_items(auth.tenant_id, id).await?;
    Ok(PayrollDetail { payroll, items })
}

pub async fn list_payrolls(
    ctx: &Context,
    auth: &AuthContext,
    filter: &PayrollFilter,
    page: PageRequest,
) -> Result<Page<Payroll>, AppError> {
    ctx.repos
        .payrolls
        .list_payrolls(auth.tenant_id, filter, page)
        .await
}

/// Build the payroll lines of each employee.
fn build_items(
    payroll: &Payroll,
    employees: &[Employee],
    deductions: &[Deduction],
    loans: &[Loan],
) -> Vec<PayrollItem> {
    let period_end = payroll.period_end();
    let mut items = Vec::new();

    for employee in employees {
        items.push(PayrollItem::new(
            payroll,
            employee.id,
            PayrollItemType::BaseSalary,
            "Base salary".to_string(),
            employee.base_salary_cents,
            None,
        ));

        for deduction in deductions
            .iter()
            .filter(|d| d.employee_id == employee.id && d.applies_to(period_end))
        {
            items.push(PayrollItem::new(
                payroll,
                employee.id,
                PayrollItemType::Deduction,
                deduction.name.clone(),
                deduction.amount_cents,
                Some(deduction.id),
            ));
        }

        for loan in loans.iter().filter(|l| {
            l.employee_id == employee.id && l.start_date <= period_end && l.outstanding_cents > 0
        }) {
            items.push(PayrollItem::new(
                payroll,
                employee.id,
                PayrollItemType::LoanInstallment,
                format!(
                    "{} ({}/{})",
                    loan.description,
                    loan.paid_installments + 1,
                    loan.installment_count
                ),
                loan.next_installment_cents(),
                Some(loan.id),
            ));
        }
    }

    items
}

/// Compute (or recompute) the items and totals of a draft or calculated payroll.
pub async fn calculate_payroll(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<PayrollDetail, AppError> {
    let mut payroll = find_payroll(ctx, auth, id).await?;
    let period_end = payroll.period_end();

    let employees = ctx
        .repos
        .employees
        .list_payable_employees(auth.tenant_id, period_end)
        .await?;
    let deductions = ctx.repos.loans.list_active_deductions(auth.tenant_id).await?;
    let loans = ctx.repos.loans.list_active_loans(auth.tenant_id).await?;

    let items = build_items(&payroll, &employees, &deductions, &loans);
    payroll.apply_calculation(&items, auth.user_id)?;
    ctx.repos.payrolls.save_calculation(&payroll, &items).await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        payroll_id = %payroll.id,
        employees = employees.len(),
        items = items.len(),
        net_cents = payroll.total_net_cents,
        "Payroll calculated"
    );
    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "payroll",
            payroll.id,
            format!(
                "Payroll {:02}/{} calculated for {} employee(s)",
                payroll.reference_month,
                payroll.reference_year,
                employees.len()
            ),
        )
        .with_new(&payroll),
    )
    .await;

    Ok(PayrollDetail { payroll, items })
}

pub async fn approve_payroll(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Payroll, AppError> {
    let approver = auth.user_id;
    let payroll = ctx
        .repos
        .payrolls
        .modify_payroll(auth.tenant_id, id, &|p| p.approve(approver))
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Approve, MODULE, "payroll", payroll.id, "Payroll approved")
            .with_new(&payroll),
    )
    .await;
    ctx.emit(auth.tenant_id, events::PAYROLL_APPROVED, &payroll);
    Ok(payroll)
}

pub async fn pay_payroll(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Payroll, AppError> {
    find_payroll(ctx, auth, id).await?;
    let payroll = ctx.repos.payrolls.settle_payroll(auth.tenant_id, id).await?;

    tracing::info!(tenant_id = %auth.tenant_id, payroll_id = %id, "Payroll paid");
    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Pay, MODULE, "payroll", payroll.id, "Payroll paid")
            .with_new(&payroll),
    )
    .await;
    ctx.emit(auth.tenant_id, events::PAYROLL_PAID, &payroll);
    Ok(payroll)
}

pub async fn cancel_payroll(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Payroll, AppError> {
    let payroll = ctx
        .repos
        .payrolls
        .modify_payroll(auth.tenant_id, id, &|p| p.cancel())
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Cancel, MODULE, "payroll", payroll.id, "Payroll cancelled")
            .with_new(&payroll),
    )
    .await;
    Ok(payroll)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::employee::TerminateEmployeeRequest;
    use crate::models::loan::{CreateDeductionRequest, CreateLoanRequest, LoanStatus};
    use crate::models::payroll::PayrollStatus;
    use crate::services::employee_service::{create_employee, terminate_employee, tests::hire};
    use crate::services::{loan_service, testing};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn march_2025(ctx: &Context, auth: &AuthContext) -> Payroll {
        create_payroll(
            ctx,
            auth,
            CreatePayrollRequest {
                reference_month: 3,
                reference_year: 2025,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn one_open_payroll_per_month() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let first = march_2025(&ctx, &auth).await;

        let again = create_payroll(
            &ctx,
            &auth,
            CreatePayrollRequest {
                reference_month: 3,
                reference_year: 2025,
            },
        )
        .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        cancel_payroll(&ctx, &auth, first.id).await.unwrap();
        march_2025(&ctx, &auth).await;
    }

    #[tokio::test]
    async fn calculation_covers_salaries_deductions_and_loans() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        let dana = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 500_000))
            .await
            .unwrap();
        let lee = create_employee(&ctx, &auth, hire("E-2", date(2024, 6, 1), 300_000))
            .await
            .unwrap();
        // hired after the month: not on this payroll
        create_employee(&ctx, &auth, hire("E-3", date(2025, 4, 1), 900_000))
            .await
            .unwrap();
        // terminated: not on the payroll either
        let gone = create_employee(&ctx, &auth, hire("E-4", date(2024, 1, 1), 900_000))
            .await
            .unwrap();
        terminate_employee(
            &ctx,
            &auth,
            gone.id,
            TerminateEmployeeRequest {
                termination_date: date(2025, 1, 31),
            },
        )
        .await
        .unwrap();

        loan_service::create_deduction(
            &ctx,
            &auth,
            CreateDeductionRequest {
                employee_id: dana.id,
                name: "Health plan".into(),
                amount_cents: 20_000,
                is_recurring: true,
                total_installments: None,
                effective_date: date(2025, 1, 1),
            },
        )
        .await
        .unwrap();
        let loan = loan_service::create_loan(
            &ctx,
            &auth,
            CreateLoanRequest {
                employee_id: lee.id,
                description: "Advance".into(),
                principal_cents: 100_000,
                installment_count: 2,
                start_date: date(2025, 3, 1),
            },
        )
        .await
        .unwrap();

        let payroll = march_2025(&ctx, &auth).await;
        let detail = calculate_payroll(&ctx, &auth, payroll.id).await.unwrap();
        assert_eq!(detail.payroll.status, PayrollStatus::Calculated);
        assert_eq!(detail.items.len(), 4);
        assert_eq!(detail.payroll.total_gross_cents, 800_000);
        assert_eq!(detail.payroll.total_deductions_cents, 70_000);
        assert_eq!(detail.payroll.total_net_cents, 730_000);

        // recalculation replaces the items
        let again = calculate_payroll(&ctx, &auth, payroll.id).await.unwrap();
        assert_eq!(again.items.len(), 4);
        assert_eq!(get_payroll(&ctx, &auth, payroll.id).await.unwrap().items.len(), 4);

        approve_payroll(&ctx, &auth, payroll.id).await.unwrap();
        let paid = pay_payroll(&ctx, &auth, payroll.id).await.unwrap();
        assert_eq!(paid.status, PayrollStatus::Paid);

        let loan = loan_service::get_loan(&ctx, &auth, loan.loan.id).await.unwrap();
        assert_eq!(loan.loan.paid_installments, 1);
        assert_eq!(loan.loan.outstanding_cents, 50_000);
        assert_eq!(loan.loan.status, LoanStatus::Active);

        assert!(matches!(
            cancel_payroll(&ctx, &auth, payroll.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pay_and_cancel_settle_on_one_outcome() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let dana = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 500_000))
            .await
            .unwrap();
        let loan = loan_service::create_loan(
            &ctx,
            &auth,
            CreateLoanRequest {
                employee_id: dana.id,
                description: "Advance".into(),
                principal_cents: 120_000,
                installment_count: 12,
                start_date: date(2025, 1, 1),
            },
        )
        .await
        .unwrap();

        let mut paid_months = 0;
        for month in 1..=12 {
            let payroll = create_payroll(
                &ctx,
                &auth,
                CreatePayrollRequest {
                    reference_month: month,
                    reference_year: 2025,
                },
            )
            .await
            .unwrap();
            calculate_payroll(&ctx, &auth, payroll.id).await.unwrap();
            approve_payroll(&ctx, &auth, payroll.id).await.unwrap();

            let pay = tokio::spawn({
                let (ctx, auth) = (ctx.clone(), auth.clone());
                async move { pay_payroll(&ctx, &auth, payroll.id).await }
            });
            let cancel = tokio::spawn({
                let (ctx, auth) = (ctx.clone(), auth.clone());
                async move { cancel_payroll(&ctx, &auth, payroll.id).await }
            });
            let paid = pay.await.unwrap();
            let cancelled = cancel.await.unwrap();
            assert!(paid.is_ok() != cancelled.is_ok(), "exactly one of pay/cancel wins");

            let stored = get_payroll(&ctx, &auth, payroll.id).await.unwrap().payroll;
            if paid.is_ok() {
                paid_months += 1;
                assert_eq!(stored.status, PayrollStatus::Paid);
                assert!(stored.cancelled_at.is_none());
            } else {
                assert_eq!(stored.status, PayrollStatus::Cancelled);
                assert!(stored.paid_at.is_none());
            }
        }

        let loan = loan_service::get_loan(&ctx, &auth, loan.loan.id).await.unwrap();
        assert_eq!(loan.loan.paid_installments, paid_months);
        assert_eq!(loan.loan.outstanding_cents, 120_000 - 10_000 * i64::from(paid_months));
    }

    #[tokio::test]
    async fn one_off_deductions_apply_once() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let dana = create_employee(&ctx, &auth, hire("E-1", date(2024, 1, 1), 500_000))
            .await
            .unwrap();
        let deduction = loan_service::create_deduction(
            &ctx,
            &auth,
            CreateDeductionRequest {
                employee_id: dana.id,
                name: "Damaged tool".into(),
                amount_cents: 5_000,
                is_recurring: false,
                total_installments: None,
                effective_date: date(2025, 3, 10),
            },
        )
        .await
        .unwrap();

        let march = march_2025(&ctx, &auth).await;
        calculate_payroll(&ctx, &auth, march.id).await.unwrap();
        approve_payroll(&ctx, &auth, march.id).await.unwrap();
        pay_payroll(&ctx, &auth, march.id).await.unwrap();

        let settled = loan_service::get_deduction(&ctx, &auth, deduction.id).await.unwrap();
        assert!(!settled.is_active);
        assert_eq!(settled.applied_installments, 1);

        let april = create_payroll(
            &ctx,
            &auth,
            CreatePayrollRequest {
                reference_month: 4,
                reference_year: 2025,
            },
        )
        .await
        .unwrap();
        let detail = calculate_payroll(&ctx, &auth, april.id).await.unwrap();
        assert_eq!(detail.payroll.total_deductions_cents, 0);
    }

    #[tokio::test]
    async fn state_machine_is_enforced() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let payroll = march_2025(&ctx, &auth).await;

        assert!(approve_payroll(&ctx, &auth, payroll.id).await.is_err());
        assert!(pay_payroll(&ctx, &auth, payroll.id).await.is_err());

        calculate_payroll(&ctx, &auth, payroll.id).await.unwrap();
        approve_payroll(&ctx, &auth, payroll.id).await.unwrap();
        assert!(matches!(
            calculate_payroll(&ctx, &auth, payroll.id).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
