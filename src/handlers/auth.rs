//! Caller identity, roles, users and API keys.
//!
//! - GET /v1/me
//! - /v1/roles, /v1/roles/{id}
//! - /v1/users, /v1/users/{id}, /v1/users/{id}/api-keys
//! - DELETE /v1/api-keys/{id}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::auth::{
    ApiKeyResponse, CreateRoleRequest, CreateUserRequest, IssueApiKeyRequest, MeResponse, Role,
    UpdateRoleRequest, UpdateUserRequest, User, permissions,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::auth_service;

/// Who am I?
///
/// # Endpoint
///
/// `GET /v1/me`
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "tenant": { "id": "…", "name": "Acme", "slug": "acme" },
///   "user": { "id": "…", "email": "admin@acme.test", "name": "Admin" },
///   "role": { "id": "…", "name": "Administrator", "permissions": ["*"] }
/// }
/// ```
///
/// Needs no permission beyond a valid key.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MeResponse>, AppError> {
    Ok(Json(auth_service::me(&state.ctx, &auth).await?))
}

/// Create a role.
///
/// # Request Body
///
/// ```json
/// { "name": "Warehouse", "description": "Stock team", "permissions": ["stock.*"] }
/// ```
///
/// Permission codes are dotted lower-case segments; a trailing `*` grants
/// every code below it. Duplicate names return 409.
pub async fn create_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::ROLES_WRITE)?;
    let role = auth_service::create_role(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Role>>, AppError> {
    auth.require(permissions::ROLES_READ)?;
    Ok(Json(auth_service::list_roles(&state.ctx, &auth).await?))
}

pub async fn get_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    auth.require(permissions::ROLES_READ)?;
    Ok(Json(auth_service::get_role(&state.ctx, &auth, id).await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, AppError> {
    auth.require(permissions::ROLES_WRITE)?;
    Ok(Json(
        auth_service::update_role(&state.ctx, &auth, id, request).await?,
    ))
}

/// Delete a role. Fails with 400 while users still hold it.
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::ROLES_WRITE)?;
    auth_service::delete_role(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a user of the caller's tenant.
///
/// # Request Body
///
/// ```json
/// { "email": "clerk@acme.test", "name": "Clerk", "role_id": "…" }
/// ```
///
/// # Response
///
/// - **201 Created**: the user
/// - **404**: unknown role
/// - **409**: email already registered in the tenant
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::USERS_WRITE)?;
    let user = auth_service::create_user(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<User>>, AppError> {
    auth.require(permissions::USERS_READ)?;
    let page = PageRequest::from(page);
    let users = auth_service::list_users(&state.ctx, &auth, page).await?;
    Ok(Json(PaginatedResponse::new(users, page)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    auth.require(permissions::USERS_READ)?;
    Ok(Json(auth_service::get_user(&state.ctx, &auth, id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    auth.require(permissions::USERS_WRITE)?;
    Ok(Json(
        auth_service::update_user(&state.ctx, &auth, id, request).await?,
    ))
}

/// Deactivate a user and every key they hold. Callers cannot deactivate themselves.
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::USERS_WRITE)?;
    auth_service::deactivate_user(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue an API key for a user.
///
/// # Response (201 Created)
///
/// The plaintext `key` appears in this response only; the server stores its
/// SHA-256 hash.
///
/// ```json
/// {
///   "id": "…",
///   "name": "CI",
///   "key_prefix": "erp_3f9a",
///   "key": "erp_3f9a…",
///   "created_at": "2025-03-01T12:00:00Z"
/// }
/// ```
pub async fn issue_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<IssueApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::USERS_WRITE)?;
    let key = auth_service::issue_api_key(&state.ctx, &auth, user_id, request).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    auth.require(permissions::USERS_READ)?;
    Ok(Json(
        auth_service::list_api_keys(&state.ctx, &auth, user_id).await?,
    ))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::USERS_WRITE)?;
    auth_service::revoke_api_key(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
