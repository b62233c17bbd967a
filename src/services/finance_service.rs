//! Payables and receivables.

use chrono::Utc;
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::finance::{
    CreateFinanceEntryRequest, EntryStatus, FinanceEntry, FinanceEntryFilter, FinanceSummary,
    MarkOverdueResponse, RegisterPaymentRequest, SummaryQuery,
};
use crate::models::webhook::events;
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "finance";

pub async fn create_entry(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateFinanceEntryRequest,
) -> Result<FinanceEntry, AppError> {
    let entry = FinanceEntry::new(auth.tenant_id, request)?;
    ctx.repos.finance.create_entry(&entry).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "finance_entry",
            entry.id,
            format!("{} of {} cents created", entry.entry_type, entry.amount_cents),
        )
        .with_new(&entry),
    )
    .await;
    Ok(entry)
}

pub async fn get_entry(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<FinanceEntry, AppError> {
    ctx.repos
        .finance
        .find_entry(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Finance entry"))
}

pub async fn list_entries(
    ctx: &Context,
    auth: &AuthContext,
    filter: &FinanceEntryFilter,
    page: PageRequest,
) -> Result<Page<FinanceEntry>, AppError> {
    ctx.repos
        .finance
        .list_entries(auth.tenant_id, filter, page)
        .await
}

pub async fn register_payment(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: RegisterPaymentRequest,
) -> Result<FinanceEntry, AppError> {
    let before = get_entry(ctx, auth, id).await?;
    let amount = request.amount_cents;
    let entry = ctx
        .repos
        .finance
        .modify_entry(auth.tenant_id, id, &|e| e.register_payment(amount))
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Pay,
            MODULE,
            "finance_entry",
            entry.id,
            format!("Payment of {} cents registered", request.amount_cents),
        )
        .with_old(&before)
        .with_new(&entry),
    )
    .await;
    if entry.status == EntryStatus::Paid {
        ctx.emit(auth.tenant_id, events::FINANCE_ENTRY_PAID, &entry);
    }
    Ok(entry)
}

pub async fn cancel_entry(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<FinanceEntry, AppError> {
    let entry = ctx
        .repos
        .finance
        .modify_entry(auth.tenant_id, id, &|e| e.cancel())
        .await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Cancel, MODULE, "finance_entry", entry.id, "Entry cancelled")
            .with_new(&entry),
    )
    .await;
    Ok(entry)
}

pub async fn delete_entry(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let entry = get_entry(ctx, auth, id).await?;
    ctx.repos.finance.delete_entry(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Delete, MODULE, "finance_entry", id, "Entry deleted")
            .with_old(&entry),
    )
    .await;
    Ok(())
}

/// Flag every open entry due before today.
pub async fn mark_overdue(
    ctx: &Context,
    auth: &AuthContext,
) -> Result<MarkOverdueResponse, AppError> {
    let today = Utc::now().date_naive();
    let updated = ctx.repos.finance.mark_overdue(auth.tenant_id, today).await?;

    tracing::info!(tenant_id = %auth.tenant_id, updated, "Overdue entries flagged");
    Ok(MarkOverdueResponse { updated })
}

/// Totals of the entries due inside `[from, to]`; open-ended when a bound is missing.
pub async fn summary(
    ctx: &Context,
    auth: &AuthContext,
    query: SummaryQuery,
) -> Result<FinanceSummary, AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if to < from {
            return Err(AppError::bad_request("Summary window ends before it starts"));
        }
    }

    let filter = FinanceEntryFilter {
        due_from: query.from,
        due_to: query.to,
        ..Default::default()
    };
    let entries = ctx
        .repos
        .finance
        .list_entries(auth.tenant_id, &filter, PageRequest::all())
        .await?;
    Ok(FinanceSummary::compute(query.from, query.to, &entries.items))
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::*;
    use crate::models::finance::EntryType;
    use crate::services::testing;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(entry_type: EntryType, amount: i64, due: NaiveDate) -> CreateFinanceEntryRequest {
        CreateFinanceEntryRequest {
            entry_type,
            description: "Invoice".into(),
            category: None,
            counterparty: None,
            amount_cents: amount,
            issue_date: due.checked_sub_days(Days::new(30)).unwrap(),
            due_date: due,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_payments_are_all_accounted_for() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let e = create_entry(&ctx, &auth, entry(EntryType::Payable, 100_000, date(2025, 5, 1)))
            .await
            .unwrap();

        let payments: Vec<_> = (0..8)
            .map(|_| {
                let (ctx, auth) = (ctx.clone(), auth.clone());
                tokio::spawn(async move {
                    register_payment(&ctx, &auth, e.id, RegisterPaymentRequest { amount_cents: 30_000 })
                        .await
                })
            })
            .collect();
        let mut accepted = 0;
        for payment in payments {
            if payment.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 3);
        let stored = get_entry(&ctx, &auth, e.id).await.unwrap();
        assert_eq!(stored.paid_amount_cents, 90_000);
        assert_eq!(stored.status, EntryStatus::PartiallyPaid);
    }

    #[tokio::test]
    async fn partial_then_full_payment() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let e = create_entry(&ctx, &auth, entry(EntryType::Receivable, 10_000, date(2025, 5, 1)))
            .await
            .unwrap();

        let partial = register_payment(&ctx, &auth, e.id, RegisterPaymentRequest { amount_cents: 4_000 })
            .await
            .unwrap();
        assert_eq!(partial.status, EntryStatus::PartiallyPaid);

        let too_much =
            register_payment(&ctx, &auth, e.id, RegisterPaymentRequest { amount_cents: 7_000 }).await;
        assert!(matches!(too_much, Err(AppError::BadRequest(_))));

        let paid = register_payment(&ctx, &auth, e.id, RegisterPaymentRequest { amount_cents: 6_000 })
            .await
            .unwrap();
        assert_eq!(paid.status, EntryStatus::Paid);
        assert!(paid.paid_at.is_some());

        assert!(cancel_entry(&ctx, &auth, e.id).await.is_err());
    }

    #[tokio::test]
    async fn entries_with_payments_cannot_be_cancelled() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let e = create_entry(&ctx, &auth, entry(EntryType::Payable, 10_000, date(2025, 5, 1)))
            .await
            .unwrap();
        register_payment(&ctx, &auth, e.id, RegisterPaymentRequest { amount_cents: 1 })
            .await
            .unwrap();
        assert!(matches!(
            cancel_entry(&ctx, &auth, e.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn past_due_entries_become_overdue() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let today = Utc::now().date_naive();
        let late = create_entry(
            &ctx,
            &auth,
            entry(EntryType::Payable, 500, today.checked_sub_days(Days::new(3)).unwrap()),
        )
        .await
        .unwrap();
        create_entry(
            &ctx,
            &auth,
            entry(EntryType::Payable, 500, today.checked_add_days(Days::new(3)).unwrap()),
        )
        .await
        .unwrap();

        assert_eq!(mark_overdue(&ctx, &auth).await.unwrap().updated, 1);
        assert_eq!(get_entry(&ctx, &auth, late.id).await.unwrap().status, EntryStatus::Overdue);
        assert_eq!(mark_overdue(&ctx, &auth).await.unwrap().updated, 0);
    }

    #[tokio::test]
    async fn summary_nets_receivables_against_payables() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let r = create_entry(&ctx, &auth, entry(EntryType::Receivable, 10_000, date(2025, 5, 10)))
            .await
            .unwrap();
        create_entry(&ctx, &auth, entry(EntryType::Payable, 4_000, date(2025, 5, 20)))
            .await
            .unwrap();
        // outside the window
        create_entry(&ctx, &auth, entry(EntryType::Payable, 99_000, date(2025, 7, 1)))
            .await
            .unwrap();
        register_payment(&ctx, &auth, r.id, RegisterPaymentRequest { amount_cents: 2_500 })
            .await
            .unwrap();

        let s = summary(
            &ctx,
            &auth,
            SummaryQuery {
                from: Some(date(2025, 5, 1)),
                to: Some(date(2025, 5, 31)),
            },
        )
        .await
        .unwrap();
        assert_eq!(s.receivable_total_cents, 10_000);
        assert_eq!(s.receivable_paid_cents, 2_500);
        assert_eq!(s.receivable_open_cents, 7_500);
        assert_eq!(s.payable_total_cents, 4_000);
        assert_eq!(s.net_balance_cents, 6_000);

        let inverted = summary(
            &ctx,
            &auth,
            SummaryQuery {
                from: Some(date(2025, 6, 1)),
                to: Some(date(2025, 5, 1)),
            },
        )
        .await;
        assert!(inverted.is_err());
    }
}
