//! Product catalog: category tree, products, sellable variants and the stock
//! items that place a variant in a bin.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::auth::slugify;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Variant {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quantity of one variant stored in one bin.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Item {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub variant_id: Uuid,
    pub bin_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

tenant_record!(Category, Product, Variant, Item);

impl Category {
    pub fn new(tenant_id: Uuid, request: CreateCategoryRequest) -> Result<Self, AppError> {
        let slug = category_slug(&request.name)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            parent_id: request.parent_id,
            name: request.name.trim().to_string(),
            slug,
            description: request.description,
            display_order: request.display_order.unwrap_or(0),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

pub fn category_slug(name: &str) -> Result<String, AppError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::bad_request(
            "Category name must contain letters or digits",
        ));
    }
    Ok(slug)
}

/// Would making `new_parent` the parent of `category_id` close a loop?
///
/// `parents` maps every category of the tenant to its current parent.
pub fn creates_cycle(
    parents: &HashMap<Uuid, Option<Uuid>>,
    category_id: Uuid,
    new_parent: Uuid,
) -> bool {
    let mut cursor = Some(new_parent);
    let mut hops = 0;
    while let Some(current) = cursor {
        if current == category_id {
            return true;
        }
        hops += 1;
        if hops > parents.len() {
            // corrupted data; treat as a cycle
            return true;
        }
        cursor = parents.get(&current).copied().flatten();
    }
    false
}

#[derive(Debug, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Nest categories under their parents, siblings ordered by display order then name.
/// Categories whose parent is missing from the input are treated as roots.
pub fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let known: std::collections::HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut by_parent: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();
    for category in categories {
        let parent = category.parent_id.filter(|p| known.contains(p));
        by_parent.entry(parent).or_default().push(category);
    }
    attach(None, &mut by_parent)
}

fn attach(
    parent: Option<Uuid>,
    by_parent: &mut HashMap<Option<Uuid>, Vec<Category>>,
) -> Vec<CategoryNode> {
    let mut siblings = by_parent.remove(&parent).unwrap_or_default();
    siblings.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
    });
    siblings
        .into_iter()
        .map(|category| {
            let children = attach(Some(category.id), by_parent);
            CategoryNode { category, children }
        })
        .collect()
}

impl Product {
    pub fn new(tenant_id: Uuid, request: CreateProductRequest) -> Result<Self, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Product name is required"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            category_id: request.category_id,
            name: request.name,
            description: request.description,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

impl Variant {
    pub fn new(product: &Product, request: CreateVariantRequest) -> Result<Self, AppError> {
        let sku = normalize_sku(&request.sku)?;
        crate::money::ensure_non_negative("Price", request.price_cents)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id: product.tenant_id,
            product_id: product.id,
            sku,
            name: request.name,
            price_cents: request.price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

pub fn normalize_sku(sku: &str) -> Result<String, AppError> {
    let sku = sku.trim().to_ascii_uppercase();
    if sku.is_empty() || sku.chars().any(char::is_whitespace) {
        return Err(AppError::bad_request("SKU must be non-empty without spaces"));
    }
    Ok(sku)
}

impl Item {
    pub fn new(tenant_id: Uuid, variant_id: Uuid, bin_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            variant_id,
            bin_id,
            quantity: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BinStock {
    pub item_id: Uuid,
    pub bin_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StockSummary {
    pub variant_id: Uuid,
    pub total_quantity: i64,
    pub bins: Vec<BinStock>,
}

impl StockSummary {
    /// Empty items are left out of the per-bin split.
    pub fn compute(variant_id: Uuid, items: &[Item]) -> Self {
        let bins: Vec<BinStock> = items
            .iter()
            .filter(|i| i.quantity > 0)
            .map(|i| BinStock {
                item_id: i.id,
                bin_id: i.bin_id,
                quantity: i.quantity,
            })
            .collect();
        Self {
            variant_id,
            total_quantity: bins.iter().map(|b| i64::from(b.quantity)).sum(),
            bins,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
}

/// `parent_id` uses a nested option: absent leaves the parent alone, `null` makes it a root.
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariantRequest {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVariantRequest {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}
