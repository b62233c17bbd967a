use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::MemoryStore;
use crate::error::AppError;
use crate::models::auth::{ApiKey, Role, Tenant, User};
use crate::pagination::{Page, PageRequest};
use crate::repositories::AuthRepository;

#[async_trait]
impl AuthRepository for MemoryStore {
    async fn create_tenant(&self, tenant: &Tenant) -> Result<(), AppError> {
        self.tenants.insert(tenant.clone()).await;
        Ok(())
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        Ok(self.tenants.get(id, id).await)
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
        Ok(self.tenants.find_any(|t| t.slug == slug).await)
    }

    async fn create_role(&self, role: &Role) -> Result<(), AppError> {
        self.roles.insert(role.clone()).await;
        Ok(())
    }

    async fn find_role(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(self.roles.get(tenant_id, id).await)
    }

    async fn find_role_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<Role>, AppError> {
        Ok(self
            .roles
            .find(tenant_id, |r| r.name.eq_ignore_ascii_case(name))
            .await)
    }

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>, AppError> {
        let mut roles = self.roles.filter(tenant_id, |_| true).await;
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update_role(&self, role: &Role) -> Result<(), AppError> {
        self.roles.replace(role).await;
        Ok(())
    }

    async fn delete_role(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        Ok(self.roles.remove_where(tenant_id, |r| r.id == id).await > 0)
    }

    async fn count_role_users(&self, tenant_id: Uuid, role_id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .users
            .count(tenant_id, |u| u.role_id == role_id && u.deleted_at.is_none())
            .await)
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.clone()).await;
        Ok(())
    }

    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .find(tenant_id, |u| u.id == id && u.deleted_at.is_none())
            .await)
    }

    async fn find_user_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .find(tenant_id, |u| {
                u.email.eq_ignore_ascii_case(email) && u.deleted_at.is_none()
            })
            .await)
    }

    async fn list_users(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<User>, AppError> {
        Ok(self
            .users
            .page(tenant_id, |u| u.deleted_at.is_none(), page)
            .await)
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        self.users.replace(user).await;
        Ok(())
    }

    async fn deactivate_user(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let _tx = self.tx.lock().await;
        let now = Utc::now();
        let changed = self
            .users
            .update_where(
                tenant_id,
                |u| u.id == id && u.deleted_at.is_none(),
                |u| {
                    u.is_active = false;
                    u.deleted_at = Some(now);
                    u.updated_at = now;
                },
            )
            .await;
        if changed == 0 {
            return Ok(false);
        }
        self.api_keys
            .update_where(tenant_id, |k| k.user_id == id, |k| k.is_active = false)
            .await;
        Ok(true)
    }

    async fn create_api_key(&self, key: &ApiKey) -> Result<(), AppError> {
        self.api_keys.insert(key.clone()).await;
        Ok(())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self
            .api_keys
            .find_any(|k| k.key_hash == key_hash && k.is_active)
            .await)
    }

    async fn find_api_key(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        Ok(self.api_keys.get(tenant_id, id).await)
    }

    async fn list_api_keys(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        Ok(self.api_keys.filter(tenant_id, |k| k.user_id == user_id).await)
    }

    async fn revoke_api_key(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let changed = self
            .api_keys
            .update_where(tenant_id, |k| k.id == id && k.is_active, |k| {
                k.is_active = false
            })
            .await;
        Ok(changed > 0)
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(key) = self.api_keys.find_any(|k| k.id == id).await {
            self.api_keys
                .update_where(key.tenant_id, |k| k.id == id, |k| k.last_used_at = Some(at))
                .await;
        }
        Ok(())
    }
}
