//! Shipping volumes: boxes or pallets packed with stock items.
//!
//! ```text
//! OPEN ──close──► CLOSED ──deliver──► DELIVERED ──return──► RETURNED
//!   ▲               │
//!   └────reopen─────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    pub enum VolumeStatus {
        Open => "OPEN",
        Closed => "CLOSED",
        Delivered => "DELIVERED",
        Returned => "RETURNED",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Volume {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub code: String,
    pub status: VolumeStatus,
    pub destination: Option<String>,
    pub notes: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VolumeItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub volume_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

tenant_record!(Volume, VolumeItem);

/// `VOL-` followed by eight upper-case hex digits.
pub fn generate_volume_code() -> String {
    let bytes: [u8; 4] = rand::random();
    format!("VOL-{}", hex::encode_upper(bytes))
}

impl Volume {
    pub fn new(tenant_id: Uuid, request: CreateVolumeRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            code: generate_volume_code(),
            status: VolumeStatus::Open,
            destination: request.destination,
            notes: request.notes,
            closed_at: None,
            delivered_at: None,
            returned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ensure_open(&self) -> Result<(), AppError> {
        if self.status != VolumeStatus::Open {
            return Err(AppError::BadRequest(format!(
                "Volume {} is {} and cannot be changed",
                self.code, self.status
            )));
        }
        Ok(())
    }

    pub fn close(&mut self, item_count: usize) -> Result<(), AppError> {
        self.ensure_open()?;
        if item_count == 0 {
            return Err(AppError::bad_request("An empty volume cannot be closed"));
        }
        let now = Utc::now();
        self.status = VolumeStatus::Closed;
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn reopen(&mut self) -> Result<(), AppError> {
        self.transition(VolumeStatus::Closed, VolumeStatus::Open)?;
        self.closed_at = None;
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), AppError> {
        self.transition(VolumeStatus::Closed, VolumeStatus::Delivered)?;
        self.delivered_at = Some(self.updated_at);
        Ok(())
    }

    pub fn mark_returned(&mut self) -> Result<(), AppError> {
        self.transition(VolumeStatus::Delivered, VolumeStatus::Returned)?;
        self.returned_at = Some(self.updated_at);
        Ok(())
    }

    fn transition(&mut self, from: VolumeStatus, to: VolumeStatus) -> Result<(), AppError> {
        if self.status != from {
            return Err(AppError::BadRequest(format!(
                "Volume must be {from} to become {to}, but is {}",
                self.status
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl VolumeItem {
    pub fn new(volume: &Volume, item_id: Uuid, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: volume.tenant_id,
            volume_id: volume.id,
            item_id,
            quantity,
            added_at: Utc::now(),
        }
    }
}

/// `quantity` more units of an item may be packed when the units already in
/// the volume leave room for them within the item's stock.
pub fn check_pack_quantity(quantity: i32, packed: i64, in_stock: i32) -> Result<(), AppError> {
    let unpacked = (i64::from(in_stock) - packed).max(0);
    if unpacked == 0 {
        return Err(AppError::BadRequest(format!(
            "All {in_stock} unit(s) of this item are already packed"
        )));
    }
    if quantity < 1 || i64::from(quantity) > unpacked {
        return Err(AppError::BadRequest(format!(
            "Quantity must be between 1 and {unpacked}"
        )));
    }
    Ok(())
}

/// One packing-list line with the catalog context of its item.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PackingLine {
    pub volume_item_id: Uuid,
    pub item_id: Uuid,
    pub sku: String,
    pub variant_name: String,
    pub bin_address: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct PackingList {
    pub volume_id: Uuid,
    pub code: String,
    pub status: VolumeStatus,
    pub destination: Option<String>,
    pub lines: Vec<PackingLine>,
    pub total_lines: usize,
    pub total_quantity: i64,
}

impl PackingList {
    pub fn new(volume: &Volume, lines: Vec<PackingLine>) -> Self {
        Self {
            volume_id: volume.id,
            code: volume.code.clone(),
            status: volume.status,
            destination: volume.destination.clone(),
            total_lines: lines.len(),
            total_quantity: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            lines,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VolumeDetail {
    #[serde(flatten)]
    pub volume: Volume,
    pub items: Vec<VolumeItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVolumeRequest {
    pub destination: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddVolumeItemRequest {
    pub item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct VolumeFilter {
    pub status: Option<VolumeStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> Volume {
        Volume::new(
            Uuid::nil(),
            CreateVolumeRequest {
                destination: Some("Dock 3".into()),
                notes: None,
            },
        )
    }

    #[test]
    fn code_format() {
        let code = generate_volume_code();
        assert_eq!(code.len(), 12);
        assert!(code.starts_with("VOL-"));
        assert!(code[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn empty_volume_cannot_close() {
        let mut v = volume();
        assert!(v.close(0).is_err());
        v.close(2).unwrap();
        assert_eq!(v.status, VolumeStatus::Closed);
        assert!(v.ensure_open().is_err());
    }

    #[test]
    fn full_lifecycle() {
        let mut v = volume();
        assert!(v.deliver().is_err());
        v.close(1).unwrap();
        v.reopen().unwrap();
        assert!(v.closed_at.is_none());
        v.close(1).unwrap();
        v.deliver().unwrap();
        assert!(v.reopen().is_err());
        v.mark_returned().unwrap();
        assert_eq!(v.status, VolumeStatus::Returned);
        assert!(v.returned_at.is_some());
    }

    #[test]
    fn packed_units_count_against_stock() {
        check_pack_quantity(10, 0, 10).unwrap();
        check_pack_quantity(4, 6, 10).unwrap();
        assert!(check_pack_quantity(5, 6, 10).is_err());
        assert!(check_pack_quantity(1, 10, 10).is_err());
        assert!(check_pack_quantity(0, 0, 10).is_err());
        // stock moved out after packing
        assert!(check_pack_quantity(1, 8, 5).is_err());
    }

    #[test]
    fn packing_list_totals() {
        let v = volume();
        let line = |q| PackingLine {
            volume_item_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            sku: "SKU-1".into(),
            variant_name: "Blue".into(),
            bin_address: "A-01-01-01".into(),
            quantity: q,
        };
        let list = PackingList::new(&v, vec![line(2), line(5)]);
        assert_eq!(list.total_lines, 2);
        assert_eq!(list.total_quantity, 7);
    }
}
