//! Signed audit trail.
//!
//! Every log row is signed with HMAC-SHA256 over
//! [`AuditLog::canonical_payload`] using the server's signing secret, so a
//! row edited directly in the database no longer verifies.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditEntry, AuditFilter, AuditLog, VerifyResponse};
use crate::pagination::{Page, PageRequest};

type HmacSha256 = Hmac<Sha256>;

/// Holds the signing secret.
#[derive(Clone)]
pub struct AuditSigner {
    secret: Arc<[u8]>,
}

impl AuditSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
        }
    }

    fn mac(&self, log: &AuditLog) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid audit signing key: {e}")))?;
        mac.update(&log.canonical_payload());
        Ok(mac)
    }

    /// Hex-encoded signature of the log.
    pub fn sign(&self, log: &AuditLog) -> Result<String, AppError> {
        Ok(hex::encode(self.mac(log)?.finalize().into_bytes()))
    }

    /// Constant-time check of the stored signature.
    pub fn verify(&self, log: &AuditLog) -> bool {
        let Ok(expected) = hex::decode(&log.signature) else {
            return false;
        };
        self.mac(log)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    }
}

/// Sign and persist an audit entry.
pub async fn record(
    ctx: &Context,
    tenant_id: Uuid,
    user_id: Option<Uuid>,
    entry: AuditEntry,
) -> Result<AuditLog, AppError> {
    let mut log = AuditLog::from_entry(tenant_id, user_id, entry);
    log.signature = ctx.signer.sign(&log)?;
    ctx.repos.audit.insert_log(&log).await?;
    Ok(log)
}

pub async fn list_logs(
    ctx: &Context,
    auth: &AuthContext,
    filter: &AuditFilter,
    page: PageRequest,
) -> Result<Page<AuditLog>, AppError> {
    ctx.repos.audit.list_logs(auth.tenant_id, filter, page).await
}

pub async fn get_log(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<AuditLog, AppError> {
    ctx.repos
        .audit
        .find_log(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Audit log"))
}

pub async fn verify_log(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VerifyResponse, AppError> {
    let log = get_log(ctx, auth, id).await?;
    let valid = ctx.signer.verify(&log);
    if !valid {
        tracing::warn!(tenant_id = %auth.tenant_id, log_id = %id, "Audit log signature mismatch");
    }
    Ok(VerifyResponse { id, valid })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::audit::AuditAction;
    use crate::services::testing;

    fn entry() -> AuditEntry {
        AuditEntry::new(
            AuditAction::Update,
            "finance",
            "finance_entry",
            Uuid::new_v4(),
            "Payment registered",
        )
        .with_new(&json!({"paid_amount_cents": 500}))
    }

    #[tokio::test]
    async fn recorded_logs_verify() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;

        let log = record(&ctx, auth.tenant_id, Some(auth.user_id), entry())
            .await
            .unwrap();
        assert_eq!(log.signature.len(), 64);

        let result = verify_log(&ctx, &auth, log.id).await.unwrap();
        assert!(result.valid);
    }

    #[test]
    fn tampering_breaks_the_signature() {
        let signer = AuditSigner::new(testing::SECRET);
        let mut log = AuditLog::from_entry(Uuid::new_v4(), None, entry());
        log.signature = signer.sign(&log).unwrap();
        assert!(signer.verify(&log));

        log.description = "Payment reversed".into();
        assert!(!signer.verify(&log));
    }

    #[test]
    fn other_secret_does_not_verify() {
        let mut log = AuditLog::from_entry(Uuid::new_v4(), None, entry());
        log.signature = AuditSigner::new(testing::SECRET).sign(&log).unwrap();
        assert!(!AuditSigner::new("another-secret-value-42").verify(&log));
    }

    #[test]
    fn garbage_signature_is_invalid() {
        let signer = AuditSigner::new(testing::SECRET);
        let mut log = AuditLog::from_entry(Uuid::new_v4(), None, entry());
        log.signature = "not-hex".into();
        assert!(!signer.verify(&log));
    }

    #[tokio::test]
    async fn logs_are_tenant_scoped() {
        let ctx = testing::context();
        let a = testing::admin(&ctx).await;
        let b = testing::admin(&ctx).await;

        let log = record(&ctx, a.tenant_id, Some(a.user_id), entry()).await.unwrap();
        assert!(matches!(
            get_log(&ctx, &b, log.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
