//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Resolve it to an active key, user, tenant and role
//! 3. Inject the caller's [`AuthContext`] into the request
//! 4. Reject unauthorized requests with HTTP 401

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::models::auth::permission_grants;
use crate::services::auth_service;

/// Authentication context attached to authenticated requests.
///
/// Every service call is scoped by `tenant_id`; `user_id` is recorded as the
/// actor in audit logs and movement rows.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub api_key_id: Uuid,
    pub role_id: Uuid,
    /// Permission codes of the caller's role, wildcards included.
    pub permissions: Vec<String>,
}

impl AuthContext {
    pub fn can(&self, code: &str) -> bool {
        self.permissions.iter().any(|held| permission_grants(held, code))
    }

    /// Fail with 403 unless the caller's role grants `code`.
    pub fn require(&self, code: &str) -> Result<(), AppError> {
        if self.can(code) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Missing permission: {code}")))
        }
    }
}

/// Bearer token of the request, if any.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hand the key to [`auth_service::authenticate`]
/// 3. If resolved: inject `AuthContext` into request, call next handler
/// 4. Otherwise: return 401 Unauthorized
///
/// Handlers extract the context with `Extension<AuthContext>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
    let auth = auth_service::authenticate(&state.ctx, token).await?;

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}
