//! Stock movements and the planning step that turns a movement request into
//! the item and bin changes it implies.
//!
//! Planning is pure: the repository loads (and locks) the rows involved into a
//! [`MovementContext`], calls [`plan_movement`], then persists every row of the
//! returned [`MovementOutcome`] in one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::catalog::Item;
use crate::models::location::Bin;

string_enum! {
    pub enum MovementType {
        Inbound => "INBOUND",
        Outbound => "OUTBOUND",
        Transfer => "TRANSFER",
        AdjustmentIn => "ADJUSTMENT_IN",
        AdjustmentOut => "ADJUSTMENT_OUT",
        Return => "RETURN",
        Loss => "LOSS",
    }
}

impl MovementType {
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MovementType::Inbound | MovementType::AdjustmentIn | MovementType::Return
        )
    }

    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            MovementType::Outbound | MovementType::AdjustmentOut | MovementType::Loss
        )
    }

    pub fn is_transfer(&self) -> bool {
        *self == MovementType::Transfer
    }

    pub fn requires_reason(&self) -> bool {
        matches!(
            self,
            MovementType::AdjustmentIn | MovementType::AdjustmentOut | MovementType::Loss
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ItemMovement {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub item_id: Uuid,
    pub variant_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub from_bin_id: Option<Uuid>,
    pub to_bin_id: Option<Uuid>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub performed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

tenant_record!(ItemMovement);

/// Request body for registering a movement.
///
/// - inbound types need `to_bin_id` plus `variant_id` (or an `item_id` to take the variant from)
/// - outbound types need `item_id`
/// - transfers need `item_id` and a different `to_bin_id`
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterMovementRequest {
    pub movement_type: MovementType,
    pub quantity: i32,
    pub item_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub to_bin_id: Option<Uuid>,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

impl RegisterMovementRequest {
    /// Shape checks that need no stored rows.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.quantity <= 0 {
            return Err(AppError::bad_request("Quantity must be positive"));
        }
        let has_reason = self
            .reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if self.movement_type.requires_reason() && !has_reason {
            return Err(AppError::BadRequest(format!(
                "A reason is required for {} movements",
                self.movement_type
            )));
        }

        let t = self.movement_type;
        if t.is_inbound() {
            if self.to_bin_id.is_none() {
                return Err(AppError::bad_request("Inbound movements need a target bin"));
            }
            if self.variant_id.is_none() && self.item_id.is_none() {
                return Err(AppError::bad_request(
                    "Inbound movements need a variant or an item",
                ));
            }
        } else if t.is_outbound() {
            if self.item_id.is_none() {
                return Err(AppError::bad_request("Outbound movements need an item"));
            }
        } else if self.item_id.is_none() || self.to_bin_id.is_none() {
            return Err(AppError::bad_request(
                "Transfers need an item and a target bin",
            ));
        }
        Ok(())
    }

    /// Variant the movement concerns, once the source item (if any) is loaded.
    pub fn resolve_variant(&self, source_item: Option<&Item>) -> Option<Uuid> {
        source_item.map(|i| i.variant_id).or(self.variant_id)
    }
}

/// Rows the movement touches, as currently stored.
#[derive(Debug, Default)]
pub struct MovementContext {
    pub source_item: Option<Item>,
    pub source_bin: Option<Bin>,
    pub target_bin: Option<Bin>,
    /// Existing item for the resolved variant in the target bin.
    pub target_item: Option<Item>,
}

/// Everything to write back.
#[derive(Debug)]
pub struct MovementOutcome {
    pub movement: ItemMovement,
    /// Changed or newly created items; persist with an upsert.
    pub items: Vec<Item>,
    pub bins: Vec<Bin>,
}

pub fn plan_movement(
    tenant_id: Uuid,
    performed_by: Uuid,
    request: &RegisterMovementRequest,
    context: MovementContext,
) -> Result<MovementOutcome, AppError> {
    request.validate()?;

    let quantity = request.quantity;
    let now = Utc::now();
    let MovementContext {
        source_item,
        source_bin,
        target_bin,
        target_item,
    } = context;

    let variant_id = request
        .resolve_variant(source_item.as_ref())
        .ok_or(AppError::NotFound("Variant"))?;

    let mut items = Vec::new();
    let mut bins = Vec::new();
    let item_id;
    let from_bin_id;
    let to_bin_id;

    if request.movement_type.is_inbound() {
        let mut bin = target_bin.ok_or(AppError::NotFound("Bin"))?;
        bin.receive(quantity)?;

        let mut item = target_item.unwrap_or_else(|| Item::new(tenant_id, variant_id, bin.id));
        item.quantity += quantity;
        item.updated_at = now;

        item_id = item.id;
        from_bin_id = None;
        to_bin_id = Some(bin.id);
        items.push(item);
        bins.push(bin);
    } else if request.movement_type.is_outbound() {
        let mut item = source_item.ok_or(AppError::NotFound("Item"))?;
        take(&mut item, quantity)?;
        item.updated_at = now;

        item_id = item.id;
        from_bin_id = Some(item.bin_id);
        to_bin_id = None;
        if let Some(mut bin) = source_bin {
            bin.release(quantity);
            bins.push(bin);
        }
        items.push(item);
    } else {
        let mut source = source_item.ok_or(AppError::NotFound("Item"))?;
        let mut target = target_bin.ok_or(AppError::NotFound("Bin"))?;
        if target.id == source.bin_id {
            return Err(AppError::bad_request(
                "Transfer target must differ from the source bin",
            ));
        }
        take(&mut source, quantity)?;
        target.receive(quantity)?;

        let mut destination =
            target_item.unwrap_or_else(|| Item::new(tenant_id, variant_id, target.id));
        destination.quantity += quantity;
        destination.updated_at = now;
        source.updated_at = now;

        item_id = source.id;
        from_bin_id = Some(source.bin_id);
        to_bin_id = Some(target.id);
        if let Some(mut bin) = source_bin {
            bin.release(quantity);
            bins.push(bin);
        }
        bins.push(target);
        items.push(source);
        items.push(destination);
    }

    let movement = ItemMovement {
        id: Uuid::new_v4(),
        tenant_id,
        item_id,
        variant_id,
        movement_type: request.movement_type,
        quantity,
        from_bin_id,
        to_bin_id,
        reason: request.reason.clone(),
        reference: request.reference.clone(),
        performed_by,
        created_at: now,
    };

    Ok(MovementOutcome {
        movement,
        items,
        bins,
    })
}

fn take(item: &mut Item, quantity: i32) -> Result<(), AppError> {
    if quantity > item.quantity {
        return Err(AppError::BadRequest(format!(
            "Insufficient stock: {} available, {} requested",
            item.quantity, quantity
        )));
    }
    item.quantity -= quantity;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub item_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
}
