//! Category tree, products and their variants.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::catalog::{
    Category, CategoryNode, CreateCategoryRequest, CreateProductRequest, CreateVariantRequest,
    Item, Product, ProductFilter, StockSummary, UpdateCategoryRequest, UpdateProductRequest,
    UpdateVariantRequest, Variant, build_tree, category_slug, creates_cycle,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "stock.catalog";

async fn ensure_slug_free(
    ctx: &Context,
    auth: &AuthContext,
    slug: &str,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    let taken = ctx
        .repos
        .catalog
        .find_category_by_slug(auth.tenant_id, slug)
        .await?;
    match taken {
        Some(other) if Some(other.id) != except => Err(AppError::Conflict(format!(
            "A category with slug {slug} already exists"
        ))),
        _ => Ok(()),
    }
}

pub async fn create_category(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateCategoryRequest,
) -> Result<Category, AppError> {
    if let Some(parent_id) = request.parent_id {
        get_category(ctx, auth, parent_id).await?;
    }
    let category = Category::new(auth.tenant_id, request)?;
    ensure_slug_free(ctx, auth, &category.slug, None).await?;
    ctx.repos.catalog.create_category(&category).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "category",
            category.id,
            format!("Category {} created", category.name),
        )
        .with_new(&category),
    )
    .await;
    Ok(category)
}

pub async fn get_category(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Category, AppError> {
    ctx.repos
        .catalog
        .find_category(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Category"))
}

pub async fn list_categories(
    ctx: &Context,
    auth: &AuthContext,
) -> Result<Vec<Category>, AppError> {
    ctx.repos.catalog.list_categories(auth.tenant_id).await
}

pub async fn category_tree(
    ctx: &Context,
    auth: &AuthContext,
) -> Result<Vec<CategoryNode>, AppError> {
    Ok(build_tree(list_categories(ctx, auth).await?))
}

pub async fn update_category(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateCategoryRequest,
) -> Result<Category, AppError> {
    let mut category = get_category(ctx, auth, id).await?;
    let before = category.clone();

    if let Some(name) = request.name {
        let slug = category_slug(&name)?;
        ensure_slug_free(ctx, auth, &slug, Some(id)).await?;
        category.name = name.trim().to_string();
        category.slug = slug;
    }
    if let Some(parent) = request.parent_id {
        if let Some(parent_id) = parent {
            get_category(ctx, auth, parent_id).await?;
            let parents: HashMap<Uuid, Option<Uuid>> = list_categories(ctx, auth)
                .await?
                .into_iter()
                .map(|c| (c.id, c.parent_id))
                .collect();
            if creates_cycle(&parents, id, parent_id) {
                return Err(AppError::bad_request(
                    "A category cannot be moved under itself or its descendants",
                ));
            }
        }
        category.parent_id = parent;
    }
    if let Some(description) = request.description {
        category.description = Some(description);
    }
    if let Some(order) = request.display_order {
        category.display_order = order;
    }
    if let Some(active) = request.is_active {
        category.is_active = active;
    }
    category.updated_at = Utc::now();
    ctx.repos.catalog.update_category(&category).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "category",
            id,
            format!("Category {} updated", category.name),
        )
        .with_old(&before)
        .with_new(&category),
    )
    .await;
    Ok(category)
}

pub async fn delete_category(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let category = get_category(ctx, auth, id).await?;
    if ctx.repos.catalog.count_child_categories(auth.tenant_id, id).await? > 0 {
        return Err(AppError::bad_request(
            "Category has subcategories and cannot be deleted",
        ));
    }
    if ctx.repos.catalog.count_category_products(auth.tenant_id, id).await? > 0 {
        return Err(AppError::bad_request(
            "Category has products and cannot be deleted",
        ));
    }
    ctx.repos.catalog.delete_category(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            MODULE,
            "category",
            id,
            format!("Category {} deleted", category.name),
        )
        .with_old(&category),
    )
    .await;
    Ok(())
}

pub async fn create_product(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateProductRequest,
) -> Result<Product, AppError> {
    if let Some(category_id) = request.category_id {
        get_category(ctx, auth, category_id).await?;
    }
    let product = Product::new(auth.tenant_id, request)?;
    ctx.repos.catalog.create_product(&product).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "product",
            product.id,
            format!("Product {} created", product.name),
        )
        .with_new(&product),
    )
    .await;
    Ok(product)
}

pub async fn get_product(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Product, AppError> {
    ctx.repos
        .catalog
        .find_product(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

pub async fn list_products(
    ctx: &Context,
    auth: &AuthContext,
    filter: &ProductFilter,
    page: PageRequest,
) -> Result<Page<Product>, AppError> {
    ctx.repos
        .catalog
        .list_products(auth.tenant_id, filter, page)
        .await
}

pub async fn update_product(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateProductRequest,
) -> Result<Product, AppError> {
    let mut product = get_product(ctx, auth, id).await?;
    let before = product.clone();

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("Product name is required"));
        }
        product.name = name;
    }
    if let Some(category_id) = request.category_id {
        get_category(ctx, auth, category_id).await?;
        product.category_id = Some(category_id);
    }
    if let Some(description) = request.description {
        product.description = Some(description);
    }
    if let Some(active) = request.is_active {
        product.is_active = active;
    }
    product.updated_at = Utc::now();
    ctx.repos.catalog.update_product(&product).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "product",
            id,
            format!("Product {} updated", product.name),
        )
        .with_old(&before)
        .with_new(&product),
    )
    .await;
    Ok(product)
}

pub async fn delete_product(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let product = get_product(ctx, auth, id).await?;
    ctx.repos.catalog.delete_product(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            MODULE,
            "product",
            id,
            format!("Product {} deleted", product.name),
        )
        .with_old(&product),
    )
    .await;
    Ok(())
}

pub async fn create_variant(
    ctx: &Context,
    auth: &AuthContext,
    product_id: Uuid,
    request: CreateVariantRequest,
) -> Result<Variant, AppError> {
    let product = get_product(ctx, auth, product_id).await?;
    let variant = Variant::new(&product, request)?;
    let taken = ctx
        .repos
        .catalog
        .find_variant_by_sku(auth.tenant_id, &variant.sku)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict(format!(
            "SKU {} already in use",
            variant.sku
        )));
    }
    ctx.repos.catalog.create_variant(&variant).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "variant",
            variant.id,
            format!("Variant {} created for {}", variant.sku, product.name),
        )
        .with_new(&variant),
    )
    .await;
    Ok(variant)
}

pub async fn get_variant(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Variant, AppError> {
    ctx.repos
        .catalog
        .find_variant(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Variant"))
}

pub async fn list_variants(
    ctx: &Context,
    auth: &AuthContext,
    product_id: Uuid,
) -> Result<Vec<Variant>, AppError> {
    get_product(ctx, auth, product_id).await?;
    ctx.repos
        .catalog
        .list_variants(auth.tenant_id, product_id)
        .await
}

pub async fn update_variant(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateVariantRequest,
) -> Result<Variant, AppError> {
    let mut variant = get_variant(ctx, auth, id).await?;
    let before = variant.clone();

    if let Some(name) = request.name {
        variant.name = name;
    }
    if let Some(price) = request.price_cents {
        crate::money::ensure_non_negative("Price", price)?;
        variant.price_cents = price;
    }
    if let Some(active) = request.is_active {
        variant.is_active = active;
    }
    variant.updated_at = Utc::now();
    ctx.repos.catalog.update_variant(&variant).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "variant",
            id,
            format!("Variant {} updated", variant.sku),
        )
        .with_old(&before)
        .with_new(&variant),
    )
    .await;
    Ok(variant)
}

pub async fn list_variant_items(
    ctx: &Context,
    auth: &AuthContext,
    variant_id: Uuid,
) -> Result<Vec<Item>, AppError> {
    get_variant(ctx, auth, variant_id).await?;
    ctx.repos
        .catalog
        .list_variant_items(auth.tenant_id, variant_id)
        .await
}

pub async fn variant_stock(
    ctx: &Context,
    auth: &AuthContext,
    variant_id: Uuid,
) -> Result<StockSummary, AppError> {
    let items = list_variant_items(ctx, auth, variant_id).await?;
    Ok(StockSummary::compute(variant_id, &items))
}
