use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::MemoryStore;
use crate::error::AppError;
use crate::models::finance::{FinanceEntry, FinanceEntryFilter};
use crate::pagination::{Page, PageRequest};
use crate::repositories::{Change, FinanceRepository};

#[async_trait]
impl FinanceRepository for MemoryStore {
    async fn create_entry(&self, entry: &FinanceEntry) -> Result<(), AppError> {
        self.finance_entries.insert(entry.clone()).await;
        Ok(())
    }

    async fn find_entry(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FinanceEntry>, AppError> {
        Ok(self
            .finance_entries
            .find(tenant_id, |e| e.id == id && e.deleted_at.is_none())
            .await)
    }

    async fn list_entries(
        &self,
        tenant_id: Uuid,
        filter: &FinanceEntryFilter,
        page: PageRequest,
    ) -> Result<Page<FinanceEntry>, AppError> {
        let mut entries = self
            .finance_entries
            .filter(tenant_id, |e| e.deleted_at.is_none() && filter.matches(e))
            .await;
        entries.sort_by_key(|e| e.due_date);
        Ok(super::paginate(entries, page))
    }

    async fn modify_entry(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, FinanceEntry>,
    ) -> Result<FinanceEntry, AppError> {
        let _tx = self.tx.lock().await;
        let mut entry = self
            .find_entry(tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Finance entry"))?;
        change(&mut entry)?;
        self.finance_entries.replace(&entry).await;
        Ok(entry)
    }

    async fn delete_entry(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let _tx = self.tx.lock().await;
        let now = Utc::now();
        let changed = self
            .finance_entries
            .update_where(tenant_id, |e| e.id == id && e.deleted_at.is_none(), |e| {
                e.deleted_at = Some(now)
            })
            .await;
        Ok(changed > 0)
    }

    async fn mark_overdue(&self, tenant_id: Uuid, today: NaiveDate) -> Result<u64, AppError> {
        let _tx = self.tx.lock().await;
        let mut changed = 0;
        self.finance_entries
            .update_where(
                tenant_id,
                |e| e.deleted_at.is_none(),
                |e| {
                    if e.mark_overdue(today) {
                        changed += 1;
                    }
                },
            )
            .await;
        Ok(changed)
    }
}
