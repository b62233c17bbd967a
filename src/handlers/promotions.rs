//! Variant promotions and price quotes.

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
use crate::models::promotion::{
    CreatePromotionRequest, PriceQuote, PromotionFilter, QuoteQuery, UpdatePromotionRequest,
    VariantPromotion,
};
use crate::pagination::{PageQuery, PageRequest, PaginatedResponse};
use crate::services::promotion_service;

/// Create a promotion for a variant.
///
/// # Request Body
///
/// ```json
/// {
///   "variant_id": "…",
///   "name": "Spring sale",
///   "discount_type": "PERCENTAGE",
///   "discount_value": 15,
///   "starts_at": "2025-03-20T00:00:00Z",
///   "ends_at": "2025-04-20T00:00:00Z"
/// }
/// ```
///
/// Percentages must be 1..=100; `FIXED_AMOUNT` values are cents and must be
/// positive. The window must end after it starts.
pub async fn create_promotion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePromotionRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(permissions::PROMOTIONS_WRITE)?;
    let promotion = promotion_service::create_promotion(&state.ctx, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

pub async fn list_promotions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<PromotionFilter>,
) -> Result<Json<PaginatedResponse<VariantPromotion>>, AppError> {
    auth.require(permissions::PROMOTIONS_READ)?;
    let page = PageRequest::from(page);
    let promotions = promotion_service::list_promotions(&state.ctx, &auth, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(promotions, page)))
}

pub async fn get_promotion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VariantPromotion>, AppError> {
    auth.require(permissions::PROMOTIONS_READ)?;
    Ok(Json(
        promotion_service::get_promotion(&state.ctx, &auth, id).await?,
    ))
}

pub async fn update_promotion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePromotionRequest>,
) -> Result<Json<VariantPromotion>, AppError> {
    auth.require(permissions::PROMOTIONS_WRITE)?;
    Ok(Json(
        promotion_service::update_promotion(&state.ctx, &auth, id, request).await?,
    ))
}

pub async fn deactivate_promotion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<VariantPromotion>, AppError> {
    auth.require(permissions::PROMOTIONS_WRITE)?;
    Ok(Json(
        promotion_service::deactivate_promotion(&state.ctx, &auth, id).await?,
    ))
}

pub async fn delete_promotion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(permissions::PROMOTIONS_WRITE)?;
    promotion_service::delete_promotion(&state.ctx, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Best price for a variant at `?at=` (defaults to now).
///
/// # Endpoint
///
/// `GET /v1/variants/{id}/promotions/quote`
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "variant_id": "…",
///   "at": "2025-04-01T12:00:00Z",
///   "base_price_cents": 1000,
///   "final_price_cents": 850,
///   "discount_cents": 150,
///   "promotion": { "id": "…", "name": "Spring sale", "…": "…" }
/// }
/// ```
///
/// Among active promotions valid at that instant, the lowest resulting
/// price wins; `promotion` is `null` when none applies.
pub async fn quote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(variant_id): Path<Uuid>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<PriceQuote>, AppError> {
    auth.require(permissions::PROMOTIONS_READ)?;
    Ok(Json(
        promotion_service::quote(&state.ctx, &auth, variant_id, query).await?,
    ))
}
