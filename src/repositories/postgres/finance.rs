use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{PgStore, limit_offset};
use crate::error::AppError;
use crate::models::finance::{FinanceEntry, FinanceEntryFilter};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{Change, FinanceRepository};

const ENTRY_COLUMNS: &str = "id, tenant_id, entry_type, description, category, counterparty, \
    amount_cents, paid_amount_cents, issue_date, due_date, status, paid_at, created_at, \
    updated_at, deleted_at";

#[async_trait]
impl FinanceRepository for PgStore {
    async fn create_entry(&self, entry: &FinanceEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO finance_entries (
                id, tenant_id, entry_type, description, category, counterparty, amount_cents,
                paid_amount_cents, issue_date, due_date, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(entry.entry_type)
        .bind(&entry.description)
        .bind(&entry.category)
        .bind(&entry.counterparty)
        .bind(entry.amount_cents)
        .bind(entry.paid_amount_cents)
        .bind(entry.issue_date)
        .bind(entry.due_date)
        .bind(entry.status)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_entry(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FinanceEntry>, AppError> {
        Ok(sqlx::query_as::<_, FinanceEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM finance_entries WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_entries(
        &self,
        tenant_id: Uuid,
        filter: &FinanceEntryFilter,
        page: PageRequest,
    ) -> Result<Page<FinanceEntry>, AppError> {
        const WHERE: &str = "tenant_id = $1 AND deleted_at IS NULL \
            AND ($2::text IS NULL OR entry_type = $2) \
            AND ($3::text IS NULL OR status = $3) \
            AND ($4::date IS NULL OR due_date >= $4) \
            AND ($5::date IS NULL OR due_date <= $5)";
        let (limit, offset) = limit_offset(page);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM finance_entries WHERE {WHERE}"))
                .bind(tenant_id)
                .bind(filter.entry_type)
                .bind(filter.status)
                .bind(filter.due_from)
                .bind(filter.due_to)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, FinanceEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM finance_entries WHERE {WHERE} \
             ORDER BY due_date, created_at LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(filter.entry_type)
        .bind(filter.status)
        .bind(filter.due_from)
        .bind(filter.due_to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn modify_entry(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, FinanceEntry>,
    ) -> Result<FinanceEntry, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut entry = sqlx::query_as::<_, FinanceEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM finance_entries \
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Finance entry"))?;
        change(&mut entry)?;

        sqlx::query(
            r#"
            UPDATE finance_entries
            SET paid_amount_cents = $3, status = $4, paid_at = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(entry.tenant_id)
        .bind(entry.id)
        .bind(entry.paid_amount_cents)
        .bind(entry.status)
        .bind(entry.paid_at)
        .bind(entry.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn delete_entry(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE finance_entries SET deleted_at = NOW() WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_overdue(&self, tenant_id: Uuid, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE finance_entries
            SET status = 'OVERDUE', updated_at = NOW()
            WHERE tenant_id = $1
              AND deleted_at IS NULL
              AND status IN ('PENDING', 'PARTIALLY_PAID')
              AND due_date < $2
            "#,
        )
        .bind(tenant_id)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
