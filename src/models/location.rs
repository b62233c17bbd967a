//! Physical storage: warehouses, their zones and the bins inside each zone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Upper bound for a single generated grid.
pub const MAX_GRID_BINS: u32 = 10_000;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Warehouse {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Zone {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Bin {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub zone_id: Uuid,
    pub address: String,
    pub capacity: i32,
    pub current_occupancy: i32,
    pub is_active: bool,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

tenant_record!(Warehouse, Zone, Bin);

/// Normalise a location code: trimmed, upper-case, non-empty.
pub fn normalize_code(code: &str) -> Result<String, AppError> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(AppError::bad_request("Code is required"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(format!("Invalid code: {code}")));
    }
    Ok(code)
}

impl Warehouse {
    pub fn new(tenant_id: Uuid, request: CreateWarehouseRequest) -> Result<Self, AppError> {
        let code = normalize_code(&request.code)?;
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Warehouse name is required"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            code,
            name: request.name,
            address: request.address,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

impl Zone {
    pub fn new(warehouse: &Warehouse, request: CreateZoneRequest) -> Result<Self, AppError> {
        let code = normalize_code(&request.code)?;
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id: warehouse.tenant_id,
            warehouse_id: warehouse.id,
            code,
            name: request.name,
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

impl Bin {
    pub fn new(zone: &Zone, address: String, capacity: i32) -> Result<Self, AppError> {
        if capacity <= 0 {
            return Err(AppError::bad_request("Bin capacity must be positive"));
        }
        let address = normalize_code(&address)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id: zone.tenant_id,
            zone_id: zone.id,
            address,
            capacity,
            current_occupancy: 0,
            is_active: true,
            is_blocked: false,
            block_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn available_capacity(&self) -> i32 {
        (self.capacity - self.current_occupancy).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.current_occupancy >= self.capacity
    }

    /// Percentage rounded to two decimals.
    pub fn occupancy_percentage(&self) -> f64 {
        if self.capacity <= 0 {
            return 0.0;
        }
        let pct = f64::from(self.current_occupancy) * 100.0 / f64::from(self.capacity);
        (pct * 100.0).round() / 100.0
    }

    /// Reserve room for incoming units.
    pub fn receive(&mut self, quantity: i32) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::BadRequest(format!("Bin {} is inactive", self.address)));
        }
        if self.is_blocked {
            return Err(AppError::BadRequest(format!("Bin {} is blocked", self.address)));
        }
        if quantity > self.available_capacity() {
            return Err(AppError::bad_request("Bin capacity exceeded"));
        }
        self.current_occupancy += quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Free room after units leave. Occupancy never drops below zero.
    pub fn release(&mut self, quantity: i32) {
        self.current_occupancy = (self.current_occupancy - quantity).max(0);
        self.updated_at = Utc::now();
    }

    pub fn block(&mut self, reason: String) -> Result<(), AppError> {
        if reason.trim().is_empty() {
            return Err(AppError::bad_request("A block reason is required"));
        }
        if self.is_blocked {
            return Err(AppError::bad_request("Bin is already blocked"));
        }
        self.is_blocked = true;
        self.block_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn unblock(&mut self) -> Result<(), AppError> {
        if !self.is_blocked {
            return Err(AppError::bad_request("Bin is not blocked"));
        }
        self.is_blocked = false;
        self.block_reason = None;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct BinResponse {
    #[serde(flatten)]
    pub bin: Bin,
    pub occupancy_percentage: f64,
    pub available_capacity: i32,
    pub is_full: bool,
}

impl From<Bin> for BinResponse {
    fn from(bin: Bin) -> Self {
        Self {
            occupancy_percentage: bin.occupancy_percentage(),
            available_capacity: bin.available_capacity(),
            is_full: bin.is_full(),
            bin,
        }
    }
}

/// Grid layout for bulk bin creation.
#[derive(Debug, Deserialize)]
pub struct GenerateBinsRequest {
    pub aisles: u32,
    pub shelves_per_aisle: u32,
    pub levels_per_shelf: u32,
    pub capacity: i32,
}

impl GenerateBinsRequest {
    /// Addresses `ZONE-AA-SS-LL`, aisle-major.
    pub fn addresses(&self, zone_code: &str) -> Result<Vec<String>, AppError> {
        let dims = [self.aisles, self.shelves_per_aisle, self.levels_per_shelf];
        if dims.iter().any(|d| *d == 0 || *d > 99) {
            return Err(AppError::bad_request(
                "Aisles, shelves and levels must be between 1 and 99",
            ));
        }
        let total = self.aisles * self.shelves_per_aisle * self.levels_per_shelf;
        if total > MAX_GRID_BINS {
            return Err(AppError::BadRequest(format!(
                "A grid may create at most {MAX_GRID_BINS} bins"
            )));
        }

        let mut addresses = Vec::with_capacity(total as usize);
        for aisle in 1..=self.aisles {
            for shelf in 1..=self.shelves_per_aisle {
                for level in 1..=self.levels_per_shelf {
                    addresses.push(format!("{zone_code}-{aisle:02}-{shelf:02}-{level:02}"));
                }
            }
        }
        Ok(addresses)
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateBinsResponse {
    pub created: usize,
    pub skipped: usize,
    pub bins: Vec<BinResponse>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ZoneOccupancy {
    pub zone_id: Uuid,
    pub total_bins: usize,
    pub blocked_bins: usize,
    pub full_bins: usize,
    pub empty_bins: usize,
    pub total_capacity: i64,
    pub total_occupancy: i64,
    pub occupancy_percentage: f64,
}

impl ZoneOccupancy {
    pub fn compute(zone_id: Uuid, bins: &[Bin]) -> Self {
        let total_capacity: i64 = bins.iter().map(|b| i64::from(b.capacity)).sum();
        let total_occupancy: i64 = bins.iter().map(|b| i64::from(b.current_occupancy)).sum();
        let occupancy_percentage = if total_capacity == 0 {
            0.0
        } else {
            ((total_occupancy as f64 * 100.0 / total_capacity as f64) * 100.0).round() / 100.0
        };

        Self {
            zone_id,
            total_bins: bins.len(),
            blocked_bins: bins.iter().filter(|b| b.is_blocked).count(),
            full_bins: bins.iter().filter(|b| b.is_full()).count(),
            empty_bins: bins.iter().filter(|b| b.current_occupancy == 0).count(),
            total_capacity,
            total_occupancy,
            occupancy_percentage,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWarehouseRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateZoneRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBinRequest {
    pub address: String,
    pub capacity: i32,
}

#[derive(Debug, Deserialize)]
pub struct BlockBinRequest {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> Zone {
        let warehouse = Warehouse::new(
            Uuid::new_v4(),
            CreateWarehouseRequest {
                code: "main".into(),
                name: "Main".into(),
                address: None,
            },
        )
        .unwrap();
        Zone::new(
            &warehouse,
            CreateZoneRequest {
                code: "a".into(),
                name: "Picking".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn codes_are_normalised() {
        assert_eq!(normalize_code(" wh-01 ").unwrap(), "WH-01");
        assert!(normalize_code("   ").is_err());
        assert!(normalize_code("A/B").is_err());
    }

    #[test]
    fn occupancy_math() {
        let mut bin = Bin::new(&zone(), "A-01".into(), 3).unwrap();
        bin.receive(1).unwrap();
        assert_eq!(bin.occupancy_percentage(), 33.33);
        assert_eq!(bin.available_capacity(), 2);
        bin.receive(2).unwrap();
        assert!(bin.is_full());
        assert_eq!(bin.occupancy_percentage(), 100.0);
    }

    #[test]
    fn receive_guards() {
        let mut bin = Bin::new(&zone(), "A-01".into(), 10).unwrap();
        let err = bin.receive(11).unwrap_err();
        assert_eq!(err.to_string(), "Bin capacity exceeded");

        bin.block("Damaged rack".into()).unwrap();
        assert!(bin.receive(1).is_err());
        bin.unblock().unwrap();
        bin.receive(1).unwrap();

        bin.is_active = false;
        assert!(bin.receive(1).is_err());
    }

    #[test]
    fn capacity_must_be_positive() {
        assert!(Bin::new(&zone(), "A-01".into(), 0).is_err());
    }

    #[test]
    fn block_requires_reason() {
        let mut bin = Bin::new(&zone(), "A-01".into(), 10).unwrap();
        assert!(bin.block(" ".into()).is_err());
        assert!(bin.unblock().is_err());
    }

    #[test]
    fn grid_addresses() {
        let request = GenerateBinsRequest {
            aisles: 2,
            shelves_per_aisle: 2,
            levels_per_shelf: 3,
            capacity: 50,
        };
        let addresses = request.addresses("A").unwrap();
        assert_eq!(addresses.len(), 12);
        assert_eq!(addresses[0], "A-01-01-01");
        assert_eq!(addresses[11], "A-02-02-03");
    }

    #[test]
    fn grid_limits() {
        let request = GenerateBinsRequest {
            aisles: 0,
            shelves_per_aisle: 1,
            levels_per_shelf: 1,
            capacity: 1,
        };
        assert!(request.addresses("A").is_err());
    }

    #[test]
    fn zone_summary() {
        let z = zone();
        let mut full = Bin::new(&z, "A-01".into(), 2).unwrap();
        full.receive(2).unwrap();
        let empty = Bin::new(&z, "A-02".into(), 6).unwrap();
        let summary = ZoneOccupancy::compute(z.id, &[full, empty]);
        assert_eq!(summary.total_bins, 2);
        assert_eq!(summary.full_bins, 1);
        assert_eq!(summary.empty_bins, 1);
        assert_eq!(summary.occupancy_percentage, 25.0);
    }
}
