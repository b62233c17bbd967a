use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{PgStore, conflict_on_unique, limit_offset};
use crate::error::AppError;
use crate::models::auth::{ApiKey, Role, Tenant, User};
use crate::pagination::{Page, PageRequest};
use crate::repositories::AuthRepository;

const ROLE_COLUMNS: &str = "id, tenant_id, name, description, permissions, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, tenant_id, role_id, email, full_name, is_active, created_at, updated_at, deleted_at";
const KEY_COLUMNS: &str =
    "id, tenant_id, user_id, label, key_hash, is_active, created_at, last_used_at";

#[async_trait]
impl AuthRepository for PgStore {
    async fn create_tenant(&self, tenant: &Tenant) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tenants (id, name, slug, is_active, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Tenant slug already exists"))?;
        Ok(())
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        Ok(sqlx::query_as::<_, Tenant>(
            "SELECT id, name, slug, is_active, created_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
        Ok(sqlx::query_as::<_, Tenant>(
            "SELECT id, name, slug, is_active, created_at FROM tenants WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_role(&self, role: &Role) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, permissions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(role.id)
        .bind(role.tenant_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A role with this name already exists"))?;
        Ok(())
    }

    async fn find_role(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_role_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<Role>, AppError> {
        Ok(sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND LOWER(name) = LOWER($2)"
        ))
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>, AppError> {
        Ok(sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 ORDER BY name"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_role(&self, role: &Role) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE roles
            SET name = $3, description = $4, permissions = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(role.tenant_id)
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A role with this name already exists"))?;
        Ok(())
    }

    async fn delete_role(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_role_users(&self, tenant_id: Uuid, role_id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND role_id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, role_id, email, full_name, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(user.role_id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("A user with this email already exists"))?;
        Ok(())
    }

    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE tenant_id = $1 AND LOWER(email) = LOWER($2) AND deleted_at IS NULL
            "#
        ))
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_users(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<User>, AppError> {
        let (limit, offset) = limit_offset(page);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        let items = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET role_id = $3, full_name = $4, is_active = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(user.tenant_id)
        .bind(user.id)
        .bind(user.role_id)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_user(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET is_active = false, deleted_at = NOW(), updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE api_keys SET is_active = false WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn create_api_key(&self, key: &ApiKey) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, tenant_id, user_id, label, key_hash, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.id)
        .bind(key.tenant_id)
        .bind(key.user_id)
        .bind(&key.label)
        .bind(&key.key_hash)
        .bind(key.is_active)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("API key already exists"))?;
        Ok(())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE key_hash = $1 AND is_active = true"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_api_key(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        Ok(sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_api_keys(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        Ok(sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            SELECT {KEY_COLUMNS} FROM api_keys
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn revoke_api_key(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = false WHERE tenant_id = $1 AND id = $2 AND is_active = true",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
