//! Employee loans and recurring payroll deductions.

use uuid::Uuid;

use super::Context;
use super::employee_service::get_employee;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::loan::{
    CreateDeductionRequest, CreateLoanRequest, Deduction, DeductionFilter, Loan, LoanFilter,
    LoanResponse,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "hr.loans";

pub async fn create_loan(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateLoanRequest,
) -> Result<LoanResponse, AppError> {
    let employee = get_employee(ctx, auth, request.employee_id).await?;
    if !employee.is_employed() {
        return Err(AppError::bad_request("Employee is terminated"));
    }

    let loan = Loan::new(auth.tenant_id, request)?;
    ctx.repos.loans.create_loan(&loan).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "loan",
            loan.id,
            format!(
                "Loan of {} cents in {} installment(s) granted",
                loan.principal_cents, loan.installment_count
            ),
        )
        .with_new(&loan),
    )
    .await;
    Ok(loan.into())
}

async fn find_loan(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Loan, AppError> {
    ctx.repos
        .loans
        .find_loan(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Loan"))
}

pub async fn get_loan(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<LoanResponse, AppError> {
    Ok(find_loan(ctx, auth, id).await?.into())
}

pub async fn list_loans(
    ctx: &Context,
    auth: &AuthContext,
    filter: &LoanFilter,
    page: PageRequest,
) -> Result<Page<LoanResponse>, AppError> {
    Ok(ctx
        .repos
        .loans
        .list_loans(auth.tenant_id, filter, page)
        .await?
        .map(Into::into))
}

/// Settle the next installment outside of a payroll run.
pub async fn register_payment(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<LoanResponse, AppError> {
    let loan = ctx
        .repos
        .loans
        .modify_loan(auth.tenant_id, id, &|l| l.register_payment().map(|_| ()))
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Pay,
            MODULE,
            "loan",
            loan.id,
            format!(
                "Installment {}/{} paid, {} cents outstanding",
                loan.paid_installments, loan.installment_count, loan.outstanding_cents
            ),
        )
        .with_new(&loan),
    )
    .await;
    Ok(loan.into())
}

pub async fn cancel_loan(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<LoanResponse, AppError> {
    let loan = ctx
        .repos
        .loans
        .modify_loan(auth.tenant_id, id, &|l| l.cancel())
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Cancel, MODULE, "loan", loan.id, "Loan cancelled")
            .with_new(&loan),
    )
    .await;
    Ok(loan.into())
}

pub async fn create_deduction(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateDeductionRequest,
) -> Result<Deduction, AppError> {
    get_employee(ctx, auth, request.employee_id).await?;

    let deduction = Deduction::new(auth.tenant_id, request)?;
    ctx.repos.loans.create_deduction(&deduction).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "deduction",
            deduction.id,
            format!("Deduction {} created", deduction.name),
        )
        .with_new(&deduction),
    )
    .await;
    Ok(deduction)
}

pub async fn get_deduction(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Deduction, AppError> {
    ctx.repos
        .loans
        .find_deduction(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Deduction"))
}

pub async fn list_deductions(
    ctx: &Context,
    auth: &AuthContext,
    filter: &DeductionFilter,
    page: PageRequest,
) -> Result<Page<Deduction>, AppError> {
    ctx.repos
        .loans
        .list_deductions(auth.tenant_id, filter, page)
        .await
}

pub async fn deactivate_deduction(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Deduction, AppError> {
    let deduction = ctx
        .repos
        .loans
        .modify_deduction(auth.tenant_id, id, &|d| d.deactivate())
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "deduction",
            deduction.id,
            format!("Deduction {} deactivated", deduction.name),
        ),
    )
    .await;
    Ok(deduction)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::loan::LoanStatus;
    use crate::services::employee_service::{create_employee, tests::hire};
    use crate::services::testing;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Context, AuthContext, Uuid) {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let employee = create_employee(&ctx, &auth, hire("E-1", date(2023, 1, 1), 300_000))
            .await
            .unwrap();
        (ctx, auth, employee.id)
    }

    #[tokio::test]
    async fn manual_payments_pay_off_the_loan() {
        let (ctx, auth, employee) = setup().await;
        let loan = create_loan(
            &ctx,
            &auth,
            CreateLoanRequest {
                employee_id: employee,
                description: "Advance".into(),
                principal_cents: 1_000,
                installment_count: 3,
                start_date: date(2025, 1, 1),
            },
        )
        .await
        .unwrap();
        assert_eq!(loan.loan.installment_cents, 334);

        register_payment(&ctx, &auth, loan.loan.id).await.unwrap();
        register_payment(&ctx, &auth, loan.loan.id).await.unwrap();
        let last = register_payment(&ctx, &auth, loan.loan.id).await.unwrap();
        assert_eq!(last.loan.outstanding_cents, 0);
        assert_eq!(last.loan.status, LoanStatus::Paid);
        assert_eq!(last.next_installment_cents, 0);

        assert!(matches!(
            register_payment(&ctx, &auth, loan.loan.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_loans_reject_payments() {
        let (ctx, auth, employee) = setup().await;
        let loan = create_loan(
            &ctx,
            &auth,
            CreateLoanRequest {
                employee_id: employee,
                description: "Advance".into(),
                principal_cents: 1_000,
                installment_count: 2,
                start_date: date(2025, 1, 1),
            },
        )
        .await
        .unwrap();
        cancel_loan(&ctx, &auth, loan.loan.id).await.unwrap();
        assert!(register_payment(&ctx, &auth, loan.loan.id).await.is_err());
    }

    #[tokio::test]
    async fn deductions_need_an_employee() {
        let (ctx, auth, _) = setup().await;
        let result = create_deduction(
            &ctx,
            &auth,
            CreateDeductionRequest {
                employee_id: Uuid::new_v4(),
                name: "Union fee".into(),
                amount_cents: 1_500,
                is_recurring: true,
                total_installments: None,
                effective_date: date(2025, 1, 1),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound("Employee"))));
    }

    #[tokio::test]
    async fn deactivate_is_not_repeatable() {
        let (ctx, auth, employee) = setup().await;
        let deduction = create_deduction(
            &ctx,
            &auth,
            CreateDeductionRequest {
                employee_id: employee,
                name: "Union fee".into(),
                amount_cents: 1_500,
                is_recurring: true,
                total_installments: None,
                effective_date: date(2025, 1, 1),
            },
        )
        .await
        .unwrap();

        let inactive = deactivate_deduction(&ctx, &auth, deduction.id).await.unwrap();
        assert!(!inactive.is_active);
        assert!(deactivate_deduction(&ctx, &auth, deduction.id).await.is_err());

        let active = list_deductions(
            &ctx,
            &auth,
            &DeductionFilter {
                employee_id: Some(employee),
                is_active: Some(true),
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(active.total, 0);
    }
}
