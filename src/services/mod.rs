//! Business logic services.
//!
//! Services contain the use cases behind every route, separated from HTTP
//! handlers. Handlers authenticate and check permissions; services validate
//! input, talk to the repositories and fire the side effects of a mutation
//! (audit log, notifications, webhook events). Side effects are best-effort:
//! their failures are logged and never fail the request.

use serde::Serialize;
use uuid::Uuid;

use crate::middleware::auth::AuthContext;
use crate::models::audit::AuditEntry;
use crate::models::notification::CreateNotificationRequest;
use crate::repositories::Repositories;

pub mod absence_service;
pub mod audit_service;
pub mod auth_service;
pub mod catalog_service;
pub mod customer_service;
pub mod employee_service;
pub mod finance_service;
pub mod loan_service;
pub mod location_service;
pub mod movement_service;
pub mod notification_service;
pub mod payroll_service;
pub mod promotion_service;
pub mod rate_limit_service;
pub mod storage_service;
pub mod vacation_service;
pub mod volume_service;
pub mod webhook_service;

pub use audit_service::AuditSigner;
pub use webhook_service::WebhookDispatcher;

/// Shared dependencies of every service call.
#[derive(Clone)]
pub struct Context {
    pub repos: Repositories,
    pub signer: AuditSigner,
    pub webhooks: WebhookDispatcher,
}

impl Context {
    pub fn new(repos: Repositories, signer: AuditSigner, webhooks: WebhookDispatcher) -> Self {
        Self {
            repos,
            signer,
            webhooks,
        }
    }

    /// Sign and store an audit entry on behalf of the caller.
    pub async fn audit(&self, auth: &AuthContext, entry: AuditEntry) {
        let action = entry.action;
        let entity = entry.entity;
        if let Err(e) = audit_service::record(self, auth.tenant_id, Some(auth.user_id), entry).await
        {
            tracing::error!(
                tenant_id = %auth.tenant_id,
                action = %action,
                entity,
                error = %e,
                "Failed to write audit log"
            );
        }
    }

    /// Send an in-app notification, logging failures.
    pub async fn notify(&self, tenant_id: Uuid, request: CreateNotificationRequest) {
        let user_id = request.user_id;
        if let Err(e) = notification_service::deliver(self, tenant_id, request).await {
            tracing::warn!(%tenant_id, %user_id, error = %e, "Failed to send notification");
        }
    }

    /// Queue a domain event for the tenant's webhook endpoints.
    pub fn emit<T: Serialize>(&self, tenant_id: Uuid, event_type: &'static str, data: &T) {
        match serde_json::to_value(data) {
            Ok(data) => self.webhooks.dispatch(tenant_id, event_type, data),
            Err(e) => tracing::warn!(event_type, error = %e, "Failed to serialize webhook data"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the service unit tests.

    use uuid::Uuid;

    use super::*;
    use crate::models::auth::{Role, Tenant, User};

    pub const SECRET: &str = "test-signing-secret-0123456789";

    pub fn context() -> Context {
        let repos = Repositories::in_memory();
        let webhooks = WebhookDispatcher::new(repos.webhooks.clone(), 1);
        Context::new(repos, AuditSigner::new(SECRET), webhooks)
    }

    /// A tenant with an all-powerful user, stored in the context.
    pub async fn admin(ctx: &Context) -> AuthContext {
        let now = chrono::Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            slug: format!("acme-{}", Uuid::new_v4().simple()),
            is_active: true,
            created_at: now,
        };
        let role = Role {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            name: "Administrator".into(),
            description: None,
            permissions: vec!["*".into()],
            created_at: now,
            updated_at: now,
        };
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            role_id: role.id,
            email: "admin@acme.test".into(),
            full_name: "Admin".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        ctx.repos.auth.create_tenant(&tenant).await.unwrap();
        ctx.repos.auth.create_role(&role).await.unwrap();
        ctx.repos.auth.create_user(&user).await.unwrap();

        AuthContext {
            tenant_id: tenant.id,
            user_id: user.id,
            api_key_id: Uuid::new_v4(),
            role_id: role.id,
            permissions: role.permissions,
        }
    }
}
