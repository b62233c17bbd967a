//! Storage seam between services and the database.
//!
//! Every functional area has an async trait. Two stores implement all of
//! them: [`postgres::PgStore`] for production and [`memory::MemoryStore`]
//! for tests and local experiments. Services only see `Arc<dyn Trait>`
//! handles bundled in [`Repositories`].
//!
//! All reads and writes are scoped by `tenant_id`. Lookups of soft-deleted
//! rows behave as if the row did not exist.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::absence::{Absence, AbsenceFilter};
use crate::models::audit::{AuditFilter, AuditLog};
use crate::models::auth::{ApiKey, Role, Tenant, User};
use crate::models::catalog::{Category, Item, Product, ProductFilter, Variant};
use crate::models::customer::{Customer, CustomerFilter};
use crate::models::employee::{Employee, EmployeeFilter};
use crate::models::finance::{FinanceEntry, FinanceEntryFilter};
use crate::models::loan::{Deduction, DeductionFilter, Loan, LoanFilter};
use crate::models::location::{Bin, Warehouse, Zone};
use crate::models::movement::{ItemMovement, MovementFilter, RegisterMovementRequest};
use crate::models::notification::Notification;
use crate::models::payroll::{Payroll, PayrollFilter, PayrollItem};
use crate::models::promotion::{PromotionFilter, VariantPromotion};
use crate::models::vacation::{VacationFilter, VacationPeriod};
use crate::models::volume::{PackingLine, Volume, VolumeFilter, VolumeItem};
use crate::models::webhook::{WebhookDelivery, WebhookEndpoint};
use crate::pagination::{Page, PageRequest};

pub mod memory;
pub mod postgres;

type Result<T> = std::result::Result<T, AppError>;

/// State change applied to a row while the store holds its lock. An error
/// leaves the stored row untouched.
pub type Change<'a, T> = &'a (dyn Fn(&mut T) -> std::result::Result<(), AppError> + Send + Sync);

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn create_tenant(&self, tenant: &Tenant) -> Result<()>;
    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>>;
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;

    async fn create_role(&self, role: &Role) -> Result<()>;
    async fn find_role(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>>;
    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>>;
    async fn update_role(&self, role: &Role) -> Result<()>;
    async fn delete_role(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
    /// Active users holding the role.
    async fn count_role_users(&self, tenant_id: Uuid, role_id: Uuid) -> Result<u64>;

    async fn create_user(&self, user: &User) -> Result<()>;
    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>>;
    async fn list_users(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<User>>;
    async fn update_user(&self, user: &User) -> Result<()>;
    /// Soft-delete the user and revoke all of its keys in one step.
    async fn deactivate_user(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;

    async fn create_api_key(&self, key: &ApiKey) -> Result<()>;
    /// Active key with this hash, in any tenant.
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;
    async fn find_api_key(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ApiKey>>;
    async fn list_api_keys(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<ApiKey>>;
    async fn revoke_api_key(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn create_employee(&self, employee: &Employee) -> Result<()>;
    async fn find_employee(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Employee>>;
    async fn find_employee_by_registration(
        &self,
        tenant_id: Uuid,
        registration_number: &str,
    ) -> Result<Option<Employee>>;
    async fn list_employees(
        &self,
        tenant_id: Uuid,
        filter: &EmployeeFilter,
        page: PageRequest,
    ) -> Result<Page<Employee>>;
    async fn update_employee(&self, employee: &Employee) -> Result<()>;
    async fn delete_employee(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
    /// Employees on the payroll of a month ending at `period_end`.
    async fn list_payable_employees(
        &self,
        tenant_id: Uuid,
        period_end: NaiveDate,
    ) -> Result<Vec<Employee>>;
}

#[async_trait]
pub trait AbsenceRepository: Send + Sync {
    /// Insert unless it overlaps a pending or approved absence of the same employee.
    async fn insert_absence(&self, absence: &Absence) -> Result<()>;
    async fn find_absence(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Absence>>;
    async fn list_absences(
        &self,
        tenant_id: Uuid,
        filter: &AbsenceFilter,
        page: PageRequest,
    ) -> Result<Page<Absence>>;
    async fn update_absence(&self, absence: &Absence) -> Result<()>;
}

#[async_trait]
pub trait VacationRepository: Send + Sync {
    async fn create_period(&self, period: &VacationPeriod) -> Result<()>;
    async fn find_period(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<VacationPeriod>>;
    async fn list_periods(
        &self,
        tenant_id: Uuid,
        filter: &VacationFilter,
        page: PageRequest,
    ) -> Result<Page<VacationPeriod>>;
    async fn list_employee_periods(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Vec<VacationPeriod>>;
    /// PENDING and AVAILABLE periods, which may change with the calendar.
    async fn list_open_periods(&self, tenant_id: Uuid) -> Result<Vec<VacationPeriod>>;
    async fn update_period(&self, period: &VacationPeriod) -> Result<()>;
}

#[async_trait]
pub trait PayrollRepository: Send + Sync {
    /// Conflict when a non-cancelled payroll exists for the same month.
    async fn create_payroll(&self, payroll: &Payroll) -> Result<()>;
    async fn find_payroll(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Payroll>>;
    async fn list_payrolls(
        &self,
        tenant_id: Uuid,
        filter: &PayrollFilter,
        page: PageRequest,
    ) -> Result<Page<Payroll>>;
    async fn list_items(&self, tenant_id: Uuid, payroll_id: Uuid) -> Result<Vec<PayrollItem>>;
    /// Replace the payroll's items and store its new totals atomically.
    async fn save_calculation(&self, payroll: &Payroll, items: &[PayrollItem]) -> Result<()>;
    /// Lock the payroll, apply `change` and persist the result.
    async fn modify_payroll(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Payroll>,
    ) -> Result<Payroll>;
    /// Mark an approved payroll paid, registering one payment on every loan
    /// and advancing every deduction it settles, atomically.
    async fn settle_payroll(&self, tenant_id: Uuid, id: Uuid) -> Result<Payroll>;
}

#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn create_loan(&self, loan: &Loan) -> Result<()>;
    async fn find_loan(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Loan>>;
    async fn list_loans(
        &self,
        tenant_id: Uuid,
        filter: &LoanFilter,
        page: PageRequest,
    ) -> Result<Page<Loan>>;
    async fn list_active_loans(&self, tenant_id: Uuid) -> Result<Vec<Loan>>;
    async fn modify_loan(&self, tenant_id: Uuid, id: Uuid, change: Change<'_, Loan>)
    -> Result<Loan>;

    async fn create_deduction(&self, deduction: &Deduction) -> Result<()>;
    async fn find_deduction(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Deduction>>;
    async fn list_deductions(
        &self,
        tenant_id: Uuid,
        filter: &DeductionFilter,
        page: PageRequest,
    ) -> Result<Page<Deduction>>;
    async fn list_active_deductions(&self, tenant_id: Uuid) -> Result<Vec<Deduction>>;
    async fn modify_deduction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, Deduction>,
    ) -> Result<Deduction>;
}

#[async_trait]
pub trait FinanceRepository: Send + Sync {
    async fn create_entry(&self, entry: &FinanceEntry) -> Result<()>;
    async fn find_entry(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FinanceEntry>>;
    async fn list_entries(
        &self,
        tenant_id: Uuid,
        filter: &FinanceEntryFilter,
        page: PageRequest,
    ) -> Result<Page<FinanceEntry>>;
    /// Lock a live entry, apply `change` and persist the result.
    async fn modify_entry(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: Change<'_, FinanceEntry>,
    ) -> Result<FinanceEntry>;
    async fn delete_entry(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
    /// Flag pending and partially paid entries due before `today`. Returns how many changed.
    async fn mark_overdue(&self, tenant_id: Uuid, today: NaiveDate) -> Result<u64>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create_warehouse(&self, warehouse: &Warehouse) -> Result<()>;
    async fn find_warehouse(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Warehouse>>;
    async fn find_warehouse_by_code(&self, tenant_id: Uuid, code: &str)
    -> Result<Option<Warehouse>>;
    async fn list_warehouses(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<Warehouse>>;
    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()>;
    async fn delete_warehouse(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;

    async fn create_zone(&self, zone: &Zone) -> Result<()>;
    async fn find_zone(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Zone>>;
    async fn find_zone_by_code(
        &self,
        tenant_id: Uuid,
        warehouse_id: Uuid,
        code: &str,
    ) -> Result<Option<Zone>>;
    async fn list_zones(&self, tenant_id: Uuid, warehouse_id: Uuid) -> Result<Vec<Zone>>;

    /// Insert a batch of bins in one transaction.
    async fn create_bins(&self, bins: &[Bin]) -> Result<()>;
    async fn find_bin(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Bin>>;
    async fn list_bins(&self, tenant_id: Uuid, zone_id: Uuid) -> Result<Vec<Bin>>;
    async fn update_bin(&self, bin: &Bin) -> Result<()>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn create_category(&self, category: &Category) -> Result<()>;
    async fn find_category(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Category>>;
    async fn find_category_by_slug(&self, tenant_id: Uuid, slug: &str)
    -> Result<Option<Category>>;
    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>>;
    async fn update_category(&self, category: &Category) -> Result<()>;
    async fn delete_category(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
    async fn count_child_categories(&self, tenant_id: Uuid, id: Uuid) -> Result<u64>;
    async fn count_category_products(&self, tenant_id: Uuid, id: Uuid) -> Result<u64>;

    async fn create_product(&self, product: &Product) -> Result<()>;
    async fn find_product(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Product>>;
    async fn list_products(
        &self,
        tenant_id: Uuid,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    async fn delete_product(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;

    async fn create_variant(&self, variant: &Variant) -> Result<()>;
    async fn find_variant(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Variant>>;
    async fn find_variant_by_sku(&self, tenant_id: Uuid, sku: &str) -> Result<Option<Variant>>;
    async fn list_variants(&self, tenant_id: Uuid, product_id: Uuid) -> Result<Vec<Variant>>;
    async fn update_variant(&self, variant: &Variant) -> Result<()>;

    async fn find_item(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Item>>;
    async fn list_variant_items(&self, tenant_id: Uuid, variant_id: Uuid) -> Result<Vec<Item>>;
}

#[async_trait]
pub trait MovementRepository: Send + Sync {
    /// Apply a movement: item quantities, bin occupancies and the movement row change together.
    async fn register_movement(
        &self,
        tenant_id: Uuid,
        performed_by: Uuid,
        request: &RegisterMovementRequest,
    ) -> Result<ItemMovement>;
    async fn list_movements(
        &self,
        tenant_id: Uuid,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Page<ItemMovement>>;
}

#[async_trait]
pub trait VolumeRepository: Send + Sync {
    async fn create_volume(&self, volume: &Volume) -> Result<()>;
    async fn find_volume(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Volume>>;
    async fn list_volumes(
        &self,
        tenant_id: Uuid,
        filter: &VolumeFilter,
        page: PageRequest,
    ) -> Result<Page<Volume>>;
    /// Lock the volume and apply `change`, which also sees the current line count.
    async fn modify_volume(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: &(dyn for<'v> Fn(&'v mut Volume, usize) -> Result<()> + Send + Sync),
    ) -> Result<Volume>;
    /// Insert a line into an open volume. The item's units already packed in
    /// the volume plus the new line may not exceed its stock.
    async fn pack_item(&self, line: &VolumeItem) -> Result<()>;
    /// Remove a line from an open volume. `false` when the line does not exist.
    async fn unpack_item(&self, tenant_id: Uuid, volume_id: Uuid, id: Uuid) -> Result<bool>;
    async fn list_volume_items(&self, tenant_id: Uuid, volume_id: Uuid)
    -> Result<Vec<VolumeItem>>;
    /// Volume items joined with their variant and bin.
    async fn packing_lines(&self, tenant_id: Uuid, volume_id: Uuid) -> Result<Vec<PackingLine>>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn create_customer(&self, customer: &Customer) -> Result<()>;
    async fn find_customer(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Customer>>;
    async fn find_customer_by_document(
        &self,
        tenant_id: Uuid,
        document: &str,
    ) -> Result<Option<Customer>>;
    async fn list_customers(
        &self,
        tenant_id: Uuid,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>>;
    async fn update_customer(&self, customer: &Customer) -> Result<()>;
    async fn delete_customer(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PromotionRepository: Send + Sync {
    async fn create_promotion(&self, promotion: &VariantPromotion) -> Result<()>;
    async fn find_promotion(&self, tenant_id: Uuid, id: Uuid)
    -> Result<Option<VariantPromotion>>;
    async fn list_promotions(
        &self,
        tenant_id: Uuid,
        filter: &PromotionFilter,
        page: PageRequest,
    ) -> Result<Page<VariantPromotion>>;
    async fn list_variant_promotions(
        &self,
        tenant_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Vec<VariantPromotion>>;
    async fn update_promotion(&self, promotion: &VariantPromotion) -> Result<()>;
    async fn delete_promotion(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert_log(&self, log: &AuditLog) -> Result<()>;
    async fn find_log(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditLog>>;
    async fn list_logs(
        &self,
        tenant_id: Uuid,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> Result<()>;
    /// Only the owner's non-deleted notification.
    async fn find_notification(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>>;
    async fn list_notifications(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>>;
    async fn count_unread(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64>;
    async fn update_notification(&self, notification: &Notification) -> Result<()>;
    async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64>;
    async fn delete_notification(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid)
    -> Result<bool>;
}

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn create_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<()>;
    async fn list_active_endpoints(&self, tenant_id: Uuid) -> Result<Vec<WebhookEndpoint>>;
    async fn deactivate_endpoint(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
    async fn record_delivery(&self, delivery: &WebhookDelivery) -> Result<()>;
    async fn list_deliveries(
        &self,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<WebhookDelivery>>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Cheap round trip to the backing store.
    async fn ping(&self) -> Result<()>;
}

/// Every repository the services use.
#[derive(Clone)]
pub struct Repositories {
    pub auth: Arc<dyn AuthRepository>,
    pub employees: Arc<dyn EmployeeRepository>,
    pub absences: Arc<dyn AbsenceRepository>,
    pub vacations: Arc<dyn VacationRepository>,
    pub payrolls: Arc<dyn PayrollRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub finance: Arc<dyn FinanceRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub movements: Arc<dyn MovementRepository>,
    pub volumes: Arc<dyn VolumeRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub promotions: Arc<dyn PromotionRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    pub fn postgres(pool: DbPool) -> Self {
        Self::from_store(Arc::new(postgres::PgStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(memory::MemoryStore::default()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AuthRepository
            + EmployeeRepository
            + AbsenceRepository
            + VacationRepository
            + PayrollRepository
            + LoanRepository
            + FinanceRepository
            + LocationRepository
            + CatalogRepository
            + MovementRepository
            + VolumeRepository
            + CustomerRepository
            + PromotionRepository
            + AuditRepository
            + NotificationRepository
            + WebhookRepository
            + HealthCheck
            + 'static,
    {
        Self {
            auth: store.clone(),
            employees: store.clone(),
            absences: store.clone(),
            vacations: store.clone(),
            payrolls: store.clone(),
            loans: store.clone(),
            finance: store.clone(),
            locations: store.clone(),
            catalog: store.clone(),
            movements: store.clone(),
            volumes: store.clone(),
            customers: store.clone(),
            promotions: store.clone(),
            audit: store.clone(),
            notifications: store.clone(),
            webhooks: store.clone(),
            health: store,
        }
    }
}
