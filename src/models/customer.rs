//! Customers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

string_enum! {
    pub enum CustomerType {
        Individual => "INDIVIDUAL",
        Business => "BUSINESS",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Customer {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub name: String,
    /// Tax or national identifier, digits and letters only, unique per tenant.
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: CustomerType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

tenant_record!(Customer);

/// Strip punctuation so `12.345.678/0001-90` and `12345678000190` collide.
pub fn normalize_document(document: &str) -> Option<String> {
    let cleaned: String = document
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn validate_email(email: Option<&str>) -> Result<(), AppError> {
    match email {
        Some(e) if !e.contains('@') => Err(AppError::bad_request("Invalid email address")),
        _ => Ok(()),
    }
}

impl Customer {
    pub fn new(tenant_id: Uuid, request: CreateCustomerRequest) -> Result<Self, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Customer name is required"));
        }
        validate_email(request.email.as_deref())?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: request.name.trim().to_string(),
            document: request.document.as_deref().and_then(normalize_document),
            email: request.email,
            phone: request.phone,
            customer_type: request.customer_type.unwrap_or(CustomerType::Individual),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn apply_update(&mut self, request: UpdateCustomerRequest) -> Result<(), AppError> {
        validate_email(request.email.as_deref())?;
        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(AppError::bad_request("Customer name is required"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(email) = request.email {
            self.email = Some(email);
        }
        if let Some(phone) = request.phone {
            self.phone = Some(phone);
        }
        if let Some(customer_type) = request.customer_type {
            self.customer_type = customer_type;
        }
        if let Some(active) = request.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: Option<CustomerType>,
}

/// The document is immutable once set.
#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerFilter {
    pub customer_type: Option<CustomerType>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_normalisation() {
        assert_eq!(
            normalize_document("12.345.678/0001-90").as_deref(),
            Some("12345678000190")
        );
        assert_eq!(normalize_document(" - "), None);
    }

    #[test]
    fn create_defaults_to_individual() {
        let c = Customer::new(
            Uuid::nil(),
            CreateCustomerRequest {
                name: " Ana Souza ".into(),
                document: Some("123.456.789-09".into()),
                email: Some("ana@example.com".into()),
                phone: None,
                customer_type: None,
            },
        )
        .unwrap();
        assert_eq!(c.name, "Ana Souza");
        assert_eq!(c.customer_type, CustomerType::Individual);
        assert_eq!(c.document.as_deref(), Some("12345678909"));
    }

    #[test]
    fn rejects_bad_email() {
        let result = Customer::new(
            Uuid::nil(),
            CreateCustomerRequest {
                name: "Acme".into(),
                document: None,
                email: Some("acme.example.com".into()),
                phone: None,
                customer_type: Some(CustomerType::Business),
            },
        );
        assert!(result.is_err());
    }
}
