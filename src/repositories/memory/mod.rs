//! In-process store used by the test suite and for running without Postgres.
//!
//! Each table is a `Vec` behind a tokio `RwLock`; lists come back newest
//! first. Operations that touch several tables take the store-wide `tx`
//! mutex so they appear atomic to each other.

mod auth;
mod finance;
mod hr;
mod platform;
mod sales;
mod stock;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::absence::Absence;
use crate::models::audit::AuditLog;
use crate::models::auth::{ApiKey, Role, Tenant, User};
use crate::models::catalog::{Category, Item, Product, Variant};
use crate::models::customer::Customer;
use crate::models::employee::Employee;
use crate::models::finance::FinanceEntry;
use crate::models::loan::{Deduction, Loan};
use crate::models::location::{Bin, Warehouse, Zone};
use crate::models::movement::ItemMovement;
use crate::models::notification::Notification;
use crate::models::payroll::{Payroll, PayrollItem};
use crate::models::promotion::VariantPromotion;
use crate::models::vacation::VacationPeriod;
use crate::models::volume::{Volume, VolumeItem};
use crate::models::webhook::{WebhookDelivery, WebhookEndpoint};
use crate::pagination::{Page, PageRequest};

use super::HealthCheck;

/// A row that belongs to one tenant.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn tenant_id(&self) -> Uuid;
}

/// One table of rows of the same type.
pub struct MemoryTable<T> {
    rows: RwLock<Vec<T>>,
}

impl<T> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Record> MemoryTable<T> {
    pub async fn insert(&self, row: T) {
        self.rows.write().await.push(row);
    }

    pub async fn insert_many(&self, rows: impl IntoIterator<Item = T>) {
        self.rows.write().await.extend(rows);
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Option<T> {
        self.find(tenant_id, |row| row.id() == id).await
    }

    pub async fn find(&self, tenant_id: Uuid, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.find_any(|row| row.tenant_id() == tenant_id && predicate(row))
            .await
    }

    /// Search across tenants.
    pub async fn find_any(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.read().await.iter().find(|row| predicate(row)).cloned()
    }

    /// Matching rows, newest first.
    pub async fn filter(&self, tenant_id: Uuid, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .await
            .iter()
            .rev()
            .filter(|row| row.tenant_id() == tenant_id && predicate(row))
            .cloned()
            .collect()
    }

    pub async fn count(&self, tenant_id: Uuid, predicate: impl Fn(&T) -> bool) -> u64 {
        self.rows
            .read()
            .await
            .iter()
            .filter(|row| row.tenant_id() == tenant_id && predicate(row))
            .count() as u64
    }

    pub async fn page(
        &self,
        tenant_id: Uuid,
        predicate: impl Fn(&T) -> bool,
        request: PageRequest,
    ) -> Page<T> {
        paginate(self.filter(tenant_id, predicate).await, request)
    }

    /// Overwrite the stored row with the same id. Returns whether it existed.
    pub async fn replace(&self, row: &T) -> bool {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|r| r.id() == row.id() && r.tenant_id() == row.tenant_id())
        {
            Some(slot) => {
                *slot = row.clone();
                true
            }
            None => false,
        }
    }

    /// Insert or overwrite by id.
    pub async fn upsert(&self, row: &T) {
        if !self.replace(row).await {
            self.insert(row.clone()).await;
        }
    }

    /// Apply `change` to every matching row. Returns how many rows matched.
    pub async fn update_where(
        &self,
        tenant_id: Uuid,
        predicate: impl Fn(&T) -> bool,
        mut change: impl FnMut(&mut T),
    ) -> u64 {
        let mut rows = self.rows.write().await;
        let mut changed = 0;
        for row in rows
            .iter_mut()
            .filter(|row| row.tenant_id() == tenant_id && predicate(row))
        {
            change(row);
            changed += 1;
        }
        changed
    }

    /// Hard delete matching rows. Returns how many were removed.
    pub async fn remove_where(&self, tenant_id: Uuid, predicate: impl Fn(&T) -> bool) -> u64 {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !(row.tenant_id() == tenant_id && predicate(row)));
        (before - rows.len()) as u64
    }
}

/// Slice an already filtered and ordered list.
pub fn paginate<T>(rows: Vec<T>, request: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
        .take(request.limit as usize)
        .collect();
    Page { items, total }
}

/// Case-insensitive substring match used by `search` filters.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Default)]
pub struct MemoryStore {
    tx: Mutex<()>,

    tenants: MemoryTable<Tenant>,
    roles: MemoryTable<Role>,
    users: MemoryTable<User>,
    api_keys: MemoryTable<ApiKey>,

    employees: MemoryTable<Employee>,
    absences: MemoryTable<Absence>,
    vacations: MemoryTable<VacationPeriod>,
    payrolls: MemoryTable<Payroll>,
    payroll_items: MemoryTable<PayrollItem>,
    loans: MemoryTable<Loan>,
    deductions: MemoryTable<Deduction>,

    finance_entries: MemoryTable<FinanceEntry>,

    warehouses: MemoryTable<Warehouse>,
    zones: MemoryTable<Zone>,
    bins: MemoryTable<Bin>,
    categories: MemoryTable<Category>,
    products: MemoryTable<Product>,
    variants: MemoryTable<Variant>,
    items: MemoryTable<Item>,
    movements: MemoryTable<ItemMovement>,
    volumes: MemoryTable<Volume>,
    volume_items: MemoryTable<VolumeItem>,

    customers: MemoryTable<Customer>,
    promotions: MemoryTable<VariantPromotion>,

    audit_logs: MemoryTable<AuditLog>,
    notifications: MemoryTable<Notification>,
    webhook_endpoints: MemoryTable<WebhookEndpoint>,
    webhook_deliveries: MemoryTable<WebhookDelivery>,
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
