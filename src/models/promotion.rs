//! Time-boxed price promotions attached to a variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    pub enum DiscountType {
        Percentage => "PERCENTAGE",
        FixedAmount => "FIXED_AMOUNT",
    }
}

impl DiscountType {
    pub fn validate_value(&self, value: i64) -> Result<(), AppError> {
        match self {
            DiscountType::Percentage if !(1..=100).contains(&value) => Err(
                AppError::bad_request("Percentage discounts must be between 1 and 100"),
            ),
            DiscountType::FixedAmount => crate::money::ensure_positive("Fixed discount", value),
            DiscountType::Percentage => Ok(()),
        }
    }

    /// Discounted price, never below zero. Percentages round half up.
    pub fn apply(&self, value: i64, price_cents: i64) -> i64 {
        let price_cents = price_cents.max(0);
        match self {
            DiscountType::Percentage => {
                let percent = i128::from(value.clamp(0, 100));
                let discount = (i128::from(price_cents) * percent + 50) / 100;
                // discount <= price, so the difference fits back into i64
                (i128::from(price_cents) - discount) as i64
            }
            DiscountType::FixedAmount => price_cents.saturating_sub(value.max(0)).max(0),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VariantPromotion {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub variant_id: Uuid,
    pub name: String,
    pub discount_type: DiscountType,
    /// Whole percent for PERCENTAGE, cents for FIXED_AMOUNT.
    pub discount_value: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

tenant_record!(VariantPromotion);

fn validate_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), AppError> {
    if ends_at <= starts_at {
        return Err(AppError::bad_request("Promotion must end after it starts"));
    }
    Ok(())
}

impl VariantPromotion {
    pub fn new(tenant_id: Uuid, request: CreatePromotionRequest) -> Result<Self, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Promotion name is required"));
        }
        request.discount_type.validate_value(request.discount_value)?;
        validate_window(request.starts_at, request.ends_at)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            variant_id: request.variant_id,
            name: request.name,
            discount_type: request.discount_type,
            discount_value: request.discount_value,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            is_active: true,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Active and `at` falls inside `[starts_at, ends_at)`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.deleted_at.is_none() && self.starts_at <= at && at < self.ends_at
    }

    pub fn apply(&self, price_cents: i64) -> i64 {
        self.discount_type.apply(self.discount_value, price_cents)
    }

    pub fn apply_update(&mut self, request: UpdatePromotionRequest) -> Result<(), AppError> {
        let discount_type = request.discount_type.unwrap_or(self.discount_type);
        let discount_value = request.discount_value.unwrap_or(self.discount_value);
        let starts_at = request.starts_at.unwrap_or(self.starts_at);
        let ends_at = request.ends_at.unwrap_or(self.ends_at);
        discount_type.validate_value(discount_value)?;
        validate_window(starts_at, ends_at)?;

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(AppError::bad_request("Promotion name is required"));
            }
            self.name = name;
        }
        if request.notes.is_some() {
            self.notes = request.notes;
        }
        self.discount_type = discount_type;
        self.discount_value = discount_value;
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::bad_request("Promotion is already inactive"));
        }
        self.is_active = false;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Price of a variant at an instant, after the best valid promotion.
#[derive(Debug, Serialize)]
pub struct PriceQuote {
    pub variant_id: Uuid,
    pub at: DateTime<Utc>,
    pub base_price_cents: i64,
    pub final_price_cents: i64,
    pub discount_cents: i64,
    pub promotion: Option<VariantPromotion>,
}

impl PriceQuote {
    /// Ties keep the promotion that appears first.
    pub fn best(
        variant_id: Uuid,
        base_price_cents: i64,
        at: DateTime<Utc>,
        promotions: Vec<VariantPromotion>,
    ) -> Self {
        let mut best: Option<(i64, VariantPromotion)> = None;
        for promotion in promotions.into_iter().filter(|p| p.is_valid_at(at)) {
            let price = promotion.apply(base_price_cents);
            if best.as_ref().is_none_or(|(current, _)| price < *current) {
                best = Some((price, promotion));
            }
        }

        let (final_price_cents, promotion) = match best {
            Some((price, promotion)) => (price, Some(promotion)),
            None => (base_price_cents, None),
        };
        Self {
            variant_id,
            at,
            base_price_cents,
            final_price_cents,
            discount_cents: base_price_cents - final_price_cents,
            promotion,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePromotionRequest {
    pub variant_id: Uuid,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromotionRequest {
    pub name: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromotionFilter {
    pub variant_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteQuery {
    pub at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn promotion(discount_type: DiscountType, value: i64) -> VariantPromotion {
        let now = Utc::now();
        VariantPromotion::new(
            Uuid::nil(),
            CreatePromotionRequest {
                variant_id: Uuid::new_v4(),
                name: "Summer".into(),
                discount_type,
                discount_value: value,
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(1),
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(DiscountType::Percentage.apply(15, 999), 849);
        assert_eq!(DiscountType::Percentage.apply(50, 1), 0);
        assert_eq!(DiscountType::Percentage.apply(100, 1_000), 0);
    }

    #[test]
    fn large_prices_do_not_overflow() {
        let price = i64::MAX / 5;
        let expected = price - (price / 10 + i64::from(price % 10 >= 5));
        assert_eq!(DiscountType::Percentage.apply(10, price), expected);
        assert_eq!(DiscountType::Percentage.apply(100, i64::MAX), 0);
        assert_eq!(DiscountType::FixedAmount.apply(i64::MAX, i64::MAX), 0);
    }

    #[test]
    fn fixed_amount_floors_at_zero() {
        assert_eq!(DiscountType::FixedAmount.apply(500, 300), 0);
        assert_eq!(DiscountType::FixedAmount.apply(500, 1_300), 800);
    }

    #[test]
    fn value_ranges() {
        assert!(DiscountType::Percentage.validate_value(0).is_err());
        assert!(DiscountType::Percentage.validate_value(101).is_err());
        assert!(DiscountType::Percentage.validate_value(100).is_ok());
        assert!(DiscountType::FixedAmount.validate_value(0).is_err());
        assert!(DiscountType::FixedAmount
            .validate_value(crate::money::MAX_CENTS + 1)
            .is_err());
    }

    #[test]
    fn window_must_be_forward() {
        let now = Utc::now();
        let result = VariantPromotion::new(
            Uuid::nil(),
            CreatePromotionRequest {
                variant_id: Uuid::new_v4(),
                name: "Backwards".into(),
                discount_type: DiscountType::FixedAmount,
                discount_value: 10,
                starts_at: now,
                ends_at: now,
                notes: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn validity() {
        let mut p = promotion(DiscountType::Percentage, 10);
        let now = Utc::now();
        assert!(p.is_valid_at(now));
        assert!(!p.is_valid_at(now + Duration::days(2)));
        p.deactivate().unwrap();
        assert!(!p.is_valid_at(now));
    }

    #[test]
    fn quote_picks_lowest_price() {
        let ten_percent = promotion(DiscountType::Percentage, 10);
        let fixed = promotion(DiscountType::FixedAmount, 250);
        let mut inactive = promotion(DiscountType::Percentage, 90);
        inactive.deactivate().unwrap();

        let quote = PriceQuote::best(Uuid::nil(), 2_000, Utc::now(), vec![ten_percent, fixed, inactive]);
        assert_eq!(quote.final_price_cents, 1_750);
        assert_eq!(quote.discount_cents, 250);
        assert_eq!(
            quote.promotion.map(|p| p.discount_type),
            Some(DiscountType::FixedAmount)
        );
    }

    #[test]
    fn quote_without_promotions() {
        let quote = PriceQuote::best(Uuid::nil(), 2_000, Utc::now(), vec![]);
        assert_eq!(quote.final_price_cents, 2_000);
        assert!(quote.promotion.is_none());
    }
}
