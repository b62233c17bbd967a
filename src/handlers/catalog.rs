//! Product catalog: categories, products, variants and their stock.

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
use crate::models::catalog::{
    Category, CategoryNode, CreateCategoryRequest, CreateProductRequest, CreateVariantRequest,
    Item, Product, ProductFilter, StockSummary, UpdateCategoryRequest, UpdateProductRequest,
    UpdateVariantRequest, Variant,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::catalog_service;

/// Create a category. The slug is derived from the name and must be free.
pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    let category = catalog_service::create_category(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Category>>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::list_categories(&state.ctx, &auth).await?,
    ))
}

/// Categories as a forest.
///
/// # Response (200 OK)
///
/// ```json
/// [
///   {
///     "id": "…",
///     "name": "Apparel",
///     "slug": "apparel",
///     "children": [ { "id": "…", "name": "Shirts", "slug": "shirts", "children": [] } ]
///   }
/// ]
/// ```
///
/// Siblings are ordered by `display_order`, then name.
pub async fn category_tree(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CategoryNode>>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(catalog_service::category_tree(&state.ctx, &auth).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::get_category(&state.ctx, &auth, id).await?,
    ))
}

/// Update a category.
///
/// `"parent_id": null` turns the category into a root; omitting the field
/// keeps the parent. Moving a category under one of its own descendants
/// returns 400.
pub async fn update_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    Ok(Json(
        catalog_service::update_category(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    catalog_service::delete_category(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    let product = catalog_service::create_product(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List products. Filters: `category_id`, `search` (name substring).
pub async fn list_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<PaginatedResponse<Product>>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    let page = PageRequest::from(page);
    let products = catalog_service::list_products(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(products, page)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::get_product(&state.ctx, &auth, id).await?,
    ))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    Ok(Json(
        catalog_service::update_product(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    catalog_service::delete_product(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a sellable variant to a product.
///
/// # Request Body
///
/// ```json
/// { "sku": "tee-blue-m", "name": "Blue / M", "price_cents": 4990 }
/// ```
///
/// SKUs are normalised to upper case and unique per tenant (409).
pub async fn create_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<CreateVariantRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    let variant = catalog_service::create_variant(&state.ctx, &auth, product_id, request).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

pub async fn list_variants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<Variant>>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::list_variants(&state.ctx, &auth, product_id).await?,
    ))
}

pub async fn get_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Variant>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::get_variant(&state.ctx, &auth, id).await?,
    ))
}

pub async fn update_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVariantRequest>,
) -> Result<Json<Variant>, AppError> {
    auth.require(permissions::CATALOG_WRITE)?;
    Ok(Json(
        catalog_service::update_variant(&state.ctx, &auth, id, request).await?,
    ))
}

/// Stock records of a variant, one per bin.
pub async fn list_variant_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Item>>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::list_variant_items(&state.ctx, &auth, id).await?,
    ))
}

/// Total quantity of a variant plus the per-bin split.
pub async fn variant_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<StockSummary>, AppError> {
    auth.require(permissions::CATALOG_READ)?;
    Ok(Json(
        catalog_service::variant_stock(&state.ctx, &auth, id).await?,
    ))
}
