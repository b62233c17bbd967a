//! Customer registry.

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
use crate::models::auth::permissions;
use crate::models::customer::{
    CreateCustomerRequest, Customer, CustomerFilter, UpdateCustomerRequest,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::customer_service;

/// Register a customer.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Globex",
///   "document": "12.345.678/0001-90",
///   "email": "buyer@globex.test",
///   "customer_type": "BUSINESS"
/// }
/// ```
///
/// Documents are stored without punctuation and must be unique per tenant (409).
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::CUSTOMERS_WRITE)?;
    let customer = customer_service::create_customer(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<PaginatedResponse<Customer>>, AppError> {
    auth.require(permissions::CUSTOMERS_READ)?;
    let page = PageRequest::from(page);
    let customers = customer_service::list_customers(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(customers, page)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    auth.require(permissions::CUSTOMERS_READ)?;
    Ok(Json(
        customer_service::get_customer(&state.ctx, &auth, id).await?,
    ))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    auth.require(permissions::CUSTOMERS_WRITE)?;
    Ok(Json(
        customer_service::update_customer(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::CUSTOMERS_WRITE)?;
    customer_service::delete_customer(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
