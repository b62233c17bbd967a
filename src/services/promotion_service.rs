//! Variant promotions and price quotes.

use chrono::Utc;
use uuid::Uuid;

use super::Context;
use super::catalog_service::get_variant;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::promotion::{
    CreatePromotionRequest, PriceQuote, PromotionFilter, QuoteQuery, UpdatePromotionRequest,
    VariantPromotion,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "sales";

pub async fn create_promotion(
    ctx: &Context,
    auth: &AuthContext,
    request: CreatePromotionRequest,
) -> Result<VariantPromotion, AppError> {
    let variant = get_variant(ctx, auth, request.variant_id).await?;
    let promotion = VariantPromotion::new(auth.tenant_id, request)?;
    ctx.repos.promotions.create_promotion(&promotion).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "promotion",
            promotion.id,
            format!("Promotion {} created for {}", promotion.name, variant.sku),
        )
        .with_new(&promotion),
    )
    .await;
    Ok(promotion)
}

pub async fn get_promotion(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VariantPromotion, AppError> {
    ctx.repos
        .promotions
        .find_promotion(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Promotion"))
}

pub async fn list_promotions(
    ctx: &Context,
    auth: &AuthContext,
    filter: &PromotionFilter,
    page: PageRequest,
) -> Result<Page<VariantPromotion>, AppError> {
    ctx.repos
        .promotions
        .list_promotions(auth.tenant_id, filter, page)
        .await
}

pub async fn update_promotion(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdatePromotionRequest,
) -> Result<VariantPromotion, AppError> {
    let mut promotion = get_promotion(ctx, auth, id).await?;
    let before = promotion.clone();
    promotion.apply_update(request)?;
    ctx.repos.promotions.update_promotion(&promotion).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "promotion",
            id,
            format!("Promotion {} updated", promotion.name),
        )
        .with_old(&before)
        .with_new(&promotion),
    )
    .await;
    Ok(promotion)
}

pub async fn deactivate_promotion(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<VariantPromotion, AppError> {
    let mut promotion = get_promotion(ctx, auth, id).await?;
    promotion.deactivate()?;
    ctx.repos.promotions.update_promotion(&promotion).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "promotion",
            id,
            format!("Promotion {} deactivated", promotion.name),
        ),
    )
    .await;
    Ok(promotion)
}

pub async fn delete_promotion(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let promotion = get_promotion(ctx, auth, id).await?;
    ctx.repos.promotions.delete_promotion(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            MODULE,
            "promotion",
            id,
            format!("Promotion {} deleted", promotion.name),
        )
        .with_old(&promotion),
    )
    .await;
    Ok(())
}

/// Variant price at `query.at` (default now) after its best valid promotion.
pub async fn quote(
    ctx: &Context,
    auth: &AuthContext,
    variant_id: Uuid,
    query: QuoteQuery,
) -> Result<PriceQuote, AppError> {
    let variant = get_variant(ctx, auth, variant_id).await?;
    let at = query.at.unwrap_or_else(Utc::now);
    let promotions = ctx
        .repos
        .promotions
        .list_variant_promotions(auth.tenant_id, variant.id)
        .await?;
    Ok(PriceQuote::best(variant.id, variant.price_cents, at, promotions))
}
