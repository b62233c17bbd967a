//! Tenancy, roles, users and API keys.
//!
//! API keys are random 32-byte hex strings. Only their SHA-256 hash is
//! stored; the plaintext is returned once, when the key is issued.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::auth::{
    ApiKey, ApiKeyResponse, CreateRoleRequest, CreateUserRequest, IssueApiKeyRequest, MeResponse,
    Role, Tenant, UpdateRoleRequest, UpdateUserRequest, User, slugify, validate_permission,
};
use crate::pagination::{Page, PageRequest};

pub const ADMIN_ROLE: &str = "Administrator";

/// Hex SHA-256 of a plaintext key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// 64 hex characters (32 random bytes).
pub fn generate_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Resolve a bearer key to the caller.
///
/// The key must be active, and so must its user and tenant. Every failure
/// looks the same to the client.
pub async fn authenticate(ctx: &Context, token: &str) -> Result<AuthContext, AppError> {
    let repo = &ctx.repos.auth;

    let key = repo
        .find_api_key_by_hash(&hash_key(token))
        .await?
        .ok_or(AppError::Unauthorized)?;
    let user = repo
        .find_user(key.tenant_id, key.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;
    repo.find_tenant(key.tenant_id)
        .await?
        .filter(|t| t.is_active)
        .ok_or(AppError::Unauthorized)?;
    let role = repo
        .find_role(key.tenant_id, user.role_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if let Err(e) = repo.touch_api_key(key.id, Utc::now()).await {
        tracing::warn!(api_key_id = %key.id, error = %e, "Failed to update key usage");
    }

    Ok(AuthContext {
        tenant_id: key.tenant_id,
        user_id: user.id,
        api_key_id: key.id,
        role_id: role.id,
        permissions: role.permissions,
    })
}

/// Create the first tenant, its administrator and a known admin key.
///
/// Safe to run on every start: existing rows are reused.
pub async fn bootstrap(
    ctx: &Context,
    tenant_name: &str,
    admin_email: &str,
    admin_key: &str,
) -> Result<Tenant, AppError> {
    let repo = &ctx.repos.auth;
    let now = Utc::now();

    let slug = slugify(tenant_name);
    if slug.is_empty() {
        return Err(AppError::bad_request("Tenant name must contain letters or digits"));
    }
    if admin_key.len() < 16 {
        return Err(AppError::bad_request("Bootstrap admin key must be at least 16 characters"));
    }

    let tenant = match repo.find_tenant_by_slug(&slug).await? {
        Some(tenant) => tenant,
        None => {
            let tenant = Tenant {
                id: Uuid::new_v4(),
                name: tenant_name.trim().to_string(),
                slug,
                is_active: true,
                created_at: now,
            };
            repo.create_tenant(&tenant).await?;
            tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "Bootstrap tenant created");
            tenant
        }
    };

    let role = match repo.find_role_by_name(tenant.id, ADMIN_ROLE).await? {
        Some(role) => role,
        None => {
            let role = Role {
                id: Uuid::new_v4(),
                tenant_id: tenant.id,
                name: ADMIN_ROLE.to_string(),
                description: Some("Full access".to_string()),
                permissions: vec!["*".to_string()],
                created_at: now,
                updated_at: now,
            };
            repo.create_role(&role).await?;
            role
        }
    };

    let user = match repo.find_user_by_email(tenant.id, admin_email).await? {
        Some(user) => user,
        None => {
            let user = User {
                id: Uuid::new_v4(),
                tenant_id: tenant.id,
                role_id: role.id,
                email: normalize_email(admin_email)?,
                full_name: "Administrator".to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            repo.create_user(&user).await?;
            user
        }
    };

    let key_hash = hash_key(admin_key);
    if repo.find_api_key_by_hash(&key_hash).await?.is_none() {
        repo.create_api_key(&ApiKey {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            user_id: user.id,
            label: "bootstrap".to_string(),
            key_hash,
            is_active: true,
            created_at: now,
            last_used_at: None,
        })
        .await?;
        tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "Bootstrap admin key registered");
    }

    Ok(tenant)
}

pub async fn me(ctx: &Context, auth: &AuthContext) -> Result<MeResponse, AppError> {
    let repo = &ctx.repos.auth;
    let user = repo
        .find_user(auth.tenant_id, auth.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let role = repo
        .find_role(auth.tenant_id, auth.role_id)
        .await?
        .ok_or(AppError::NotFound("Role"))?;
    let tenant = repo
        .find_tenant(auth.tenant_id)
        .await?
        .ok_or(AppError::NotFound("Tenant"))?;
    Ok(MeResponse { user, role, tenant })
}

// Roles

fn validate_permissions(codes: &[String]) -> Result<(), AppError> {
    codes.iter().try_for_each(|code| validate_permission(code))
}

fn clean_name(name: &str, what: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(format!("{what} is required")));
    }
    Ok(name.to_string())
}

pub async fn create_role(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateRoleRequest,
) -> Result<Role, AppError> {
    let name = clean_name(&request.name, "Role name")?;
    validate_permissions(&request.permissions)?;

    if ctx
        .repos
        .auth
        .find_role_by_name(auth.tenant_id, &name)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("A role with this name already exists".into()));
    }

    let now = Utc::now();
    let role = Role {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        name,
        description: request.description,
        permissions: request.permissions,
        created_at: now,
        updated_at: now,
    };
    ctx.repos.auth.create_role(&role).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Create, "rbac", "role", role.id, format!("Role {} created", role.name))
            .with_new(&role),
    )
    .await;
    Ok(role)
}

pub async fn list_roles(ctx: &Context, auth: &AuthContext) -> Result<Vec<Role>, AppError> {
    ctx.repos.auth.list_roles(auth.tenant_id).await
}

pub async fn get_role(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Role, AppError> {
    ctx.repos
        .auth
        .find_role(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Role"))
}

pub async fn update_role(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateRoleRequest,
) -> Result<Role, AppError> {
    let mut role = get_role(ctx, auth, id).await?;
    let before = role.clone();

    if let Some(name) = request.name {
        let name = clean_name(&name, "Role name")?;
        if name != role.name {
            if let Some(existing) = ctx.repos.auth.find_role_by_name(auth.tenant_id, &name).await? {
                if existing.id != role.id {
                    return Err(AppError::Conflict("A role with this name already exists".into()));
                }
            }
            role.name = name;
        }
    }
    if let Some(description) = request.description {
        role.description = Some(description);
    }
    if let Some(permissions) = request.permissions {
        validate_permissions(&permissions)?;
        role.permissions = permissions;
    }
    role.updated_at = Utc::now();
    ctx.repos.auth.update_role(&role).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Update, "rbac", "role", role.id, format!("Role {} updated", role.name))
            .with_old(&before)
            .with_new(&role),
    )
    .await;
    Ok(role)
}

pub async fn delete_role(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let role = get_role(ctx, auth, id).await?;
    let holders = ctx.repos.auth.count_role_users(auth.tenant_id, id).await?;
    if holders > 0 {
        return Err(AppError::BadRequest(format!(
            "Role is still assigned to {holders} user(s)"
        )));
    }
    ctx.repos.auth.delete_role(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Delete, "rbac", "role", id, format!("Role {} deleted", role.name))
            .with_old(&role),
    )
    .await;
    Ok(())
}

// Users

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::bad_request("Invalid email address")),
    }
}

pub async fn create_user(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateUserRequest,
) -> Result<User, AppError> {
    let email = normalize_email(&request.email)?;
    let full_name = clean_name(&request.full_name, "Full name")?;
    get_role(ctx, auth, request.role_id).await?;

    if ctx
        .repos
        .auth
        .find_user_by_email(auth.tenant_id, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("A user with this email already exists".into()));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        role_id: request.role_id,
        email,
        full_name,
        is_active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    ctx.repos.auth.create_user(&user).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Create, "rbac", "user", user.id, format!("User {} created", user.email))
            .with_new(&user),
    )
    .await;
    Ok(user)
}

pub async fn list_users(
    ctx: &Context,
    auth: &AuthContext,
    page: PageRequest,
) -> Result<Page<User>, AppError> {
    ctx.repos.auth.list_users(auth.tenant_id, page).await
}

pub async fn get_user(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<User, AppError> {
    ctx.repos
        .auth
        .find_user(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub async fn update_user(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut user = get_user(ctx, auth, id).await?;
    let before = user.clone();

    if let Some(full_name) = request.full_name {
        user.full_name = clean_name(&full_name, "Full name")?;
    }
    if let Some(role_id) = request.role_id {
        get_role(ctx, auth, role_id).await?;
        user.role_id = role_id;
    }
    user.updated_at = Utc::now();
    ctx.repos.auth.update_user(&user).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Update, "rbac", "user", user.id, format!("User {} updated", user.email))
            .with_old(&before)
            .with_new(&user),
    )
    .await;
    Ok(user)
}

/// Soft delete; the user's keys stop working immediately.
pub async fn deactivate_user(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    if id == auth.user_id {
        return Err(AppError::bad_request("You cannot deactivate yourself"));
    }
    if !ctx.repos.auth.deactivate_user(auth.tenant_id, id).await? {
        return Err(AppError::NotFound("User"));
    }

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Delete, "rbac", "user", id, "User deactivated"),
    )
    .await;
    Ok(())
}

// API keys

pub async fn issue_api_key(
    ctx: &Context,
    auth: &AuthContext,
    user_id: Uuid,
    request: IssueApiKeyRequest,
) -> Result<ApiKeyResponse, AppError> {
    let user = get_user(ctx, auth, user_id).await?;
    let label = clean_name(&request.label, "Label")?;

    let plaintext = generate_key();
    let key = ApiKey {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        user_id: user.id,
        label,
        key_hash: hash_key(&plaintext),
        is_active: true,
        created_at: Utc::now(),
        last_used_at: None,
    };
    ctx.repos.auth.create_api_key(&key).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            "rbac",
            "api_key",
            key.id,
            format!("API key {} issued for {}", key.label, user.email),
        ),
    )
    .await;
    Ok(ApiKeyResponse::from(key).with_key(plaintext))
}

pub async fn list_api_keys(
    ctx: &Context,
    auth: &AuthContext,
    user_id: Uuid,
) -> Result<Vec<ApiKeyResponse>, AppError> {
    get_user(ctx, auth, user_id).await?;
    let keys = ctx.repos.auth.list_api_keys(auth.tenant_id, user_id).await?;
    Ok(keys.into_iter().map(Into::into).collect())
}

pub async fn revoke_api_key(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    if !ctx.repos.auth.revoke_api_key(auth.tenant_id, id).await? {
        return Err(AppError::NotFound("API key"));
    }

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Delete, "rbac", "api_key", id, "API key revoked"),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    const ADMIN_KEY: &str = "bootstrap-admin-key-0001";

    #[test]
    fn hashes_are_stable_hex() {
        assert_eq!(hash_key("abc"), hash_key("abc"));
        assert_eq!(hash_key("abc").len(), 64);
        assert_ne!(hash_key("abc"), hash_key("abd"));
        assert_eq!(generate_key().len(), 64);
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let ctx = testing::context();
        let first = bootstrap(&ctx, "Acme Corp", "admin@acme.test", ADMIN_KEY)
            .await
            .unwrap();
        let second = bootstrap(&ctx, "Acme Corp", "admin@acme.test", ADMIN_KEY)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.slug, "acme-corp");

        let auth = authenticate(&ctx, ADMIN_KEY).await.unwrap();
        assert_eq!(auth.tenant_id, first.id);
        assert!(auth.can("hr.payroll.pay"));
        assert_eq!(ctx.repos.auth.list_roles(first.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_keys_are_unauthorized() {
        let ctx = testing::context();
        assert!(matches!(
            authenticate(&ctx, "nope").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn issued_keys_authenticate_until_revoked() {
        let ctx = testing::context();
        let admin = testing::admin(&ctx).await;

        let issued = issue_api_key(
            &ctx,
            &admin,
            admin.user_id,
            IssueApiKeyRequest { label: "ci".into() },
        )
        .await
        .unwrap();
        let plaintext = issued.key.clone().unwrap();

        let auth = authenticate(&ctx, &plaintext).await.unwrap();
        assert_eq!(auth.api_key_id, issued.id);

        let listed = list_api_keys(&ctx, &admin, admin.user_id).await.unwrap();
        assert!(listed.iter().all(|k| k.key.is_none()));

        revoke_api_key(&ctx, &admin, issued.id).await.unwrap();
        assert!(matches!(
            authenticate(&ctx, &plaintext).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn deactivated_users_lose_access() {
        let ctx = testing::context();
        let admin = testing::admin(&ctx).await;
        let clerk = create_user(
            &ctx,
            &admin,
            CreateUserRequest {
                email: "Clerk@Acme.test".into(),
                full_name: "Clerk".into(),
                role_id: admin.role_id,
            },
        )
        .await
        .unwrap();
        assert_eq!(clerk.email, "clerk@acme.test");

        let key = issue_api_key(&ctx, &admin, clerk.id, IssueApiKeyRequest { label: "k".into() })
            .await
            .unwrap()
            .key
            .unwrap();
        deactivate_user(&ctx, &admin, clerk.id).await.unwrap();

        assert!(matches!(authenticate(&ctx, &key).await, Err(AppError::Unauthorized)));
        assert!(matches!(get_user(&ctx, &admin, clerk.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let ctx = testing::context();
        let admin = testing::admin(&ctx).await;
        let request = || CreateUserRequest {
            email: "ops@acme.test".into(),
            full_name: "Ops".into(),
            role_id: admin.role_id,
        };
        create_user(&ctx, &admin, request()).await.unwrap();
        assert!(matches!(
            create_user(&ctx, &admin, request()).await,
            Err(AppError::Conflict(_))
        ));

        let bad = CreateUserRequest {
            email: "no-at-sign".into(),
            ..request()
        };
        assert!(matches!(create_user(&ctx, &admin, bad).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn roles_validate_and_guard_deletion() {
        let ctx = testing::context();
        let admin = testing::admin(&ctx).await;

        let invalid = create_role(
            &ctx,
            &admin,
            CreateRoleRequest {
                name: "Broken".into(),
                description: None,
                permissions: vec!["HR.Payroll".into()],
            },
        )
        .await;
        assert!(matches!(invalid, Err(AppError::BadRequest(_))));

        let clerk = create_role(
            &ctx,
            &admin,
            CreateRoleRequest {
                name: "Clerk".into(),
                description: None,
                permissions: vec!["stock.*".into()],
            },
        )
        .await
        .unwrap();

        let duplicate = create_role(
            &ctx,
            &admin,
            CreateRoleRequest {
                name: "Clerk".into(),
                description: None,
                permissions: vec![],
            },
        )
        .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        create_user(
            &ctx,
            &admin,
            CreateUserRequest {
                email: "c@acme.test".into(),
                full_name: "C".into(),
                role_id: clerk.id,
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            delete_role(&ctx, &admin, clerk.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn me_describes_the_caller() {
        let ctx = testing::context();
        let admin = testing::admin(&ctx).await;
        let me = me(&ctx, &admin).await.unwrap();
        assert_eq!(me.user.id, admin.user_id);
        assert_eq!(me.role.name, "Administrator");
        assert_eq!(me.tenant.id, admin.tenant_id);
    }
}
