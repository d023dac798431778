// src/models/raw_material.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

use super::validate_not_blank;

/// Raw material stock, quantity in kilograms.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct RawMaterial {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub material_type: String,
    pub quantity: f64,
    pub batch_number: String,
    pub expiration_date: NaiveDate,
    pub supplier: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStatus {
    Expired,
    Expiring,
    Valid,
}

impl ExpirationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationStatus::Expired => "expired",
            ExpirationStatus::Expiring => "expiring",
            ExpirationStatus::Valid => "valid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "expired" => Some(ExpirationStatus::Expired),
            "expiring" => Some(ExpirationStatus::Expiring),
            "valid" => Some(ExpirationStatus::Valid),
            _ => None,
        }
    }
}

/// A material together with its expiration bucket as of the request.
#[derive(Debug, Serialize, Clone)]
pub struct RawMaterialView {
    #[serde(flatten)]
    pub material: RawMaterial,
    pub expiration_status: ExpirationStatus,
    pub days_until_expiration: i64,
    pub low_stock: bool,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateRawMaterialRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(
        length(min = 1, max = 100, message = "Type must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub material_type: String,
    #[validate(range(min = 0.0, max = 1e9, message = "Quantity must be between 0 and 1e9 kg"))]
    pub quantity: f64,
    #[validate(
        length(min = 1, max = 100, message = "Batch number must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub batch_number: String,
    pub expiration_date: NaiveDate,
    #[validate(length(max = 255, message = "Supplier cannot exceed 255 characters"))]
    pub supplier: Option<String>,
    #[validate(length(max = 255, message = "Storage location cannot exceed 255 characters"))]
    pub storage_location: Option<String>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct UpdateRawMaterialRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[validate(
        length(min = 1, max = 100, message = "Type must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub material_type: Option<String>,
    #[validate(range(min = 0.0, max = 1e9, message = "Quantity must be between 0 and 1e9 kg"))]
    pub quantity: Option<f64>,
    #[validate(
        length(min = 1, max = 100, message = "Batch number must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub batch_number: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    #[validate(length(max = 255, message = "Supplier cannot exceed 255 characters"))]
    pub supplier: Option<String>,
    #[validate(length(max = 255, message = "Storage location cannot exceed 255 characters"))]
    pub storage_location: Option<String>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_status_from_str() {
        assert_eq!(ExpirationStatus::from_str("expired"), Some(ExpirationStatus::Expired));
        assert_eq!(ExpirationStatus::from_str("EXPIRING"), Some(ExpirationStatus::Expiring));
        assert_eq!(ExpirationStatus::from_str("all"), None);
    }

    #[test]
    fn test_raw_material_request_validation() {
        let json = serde_json::json!({
            "name": "Resina UV",
            "type": "Matéria-Prima",
            "quantity": 25.5,
            "batch_number": "RM-2041",
            "expiration_date": "2027-03-01",
            "supplier": "Fornecedor A"
        });
        let request: CreateRawMaterialRequest = serde_json::from_value(json).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.material_type, "Matéria-Prima");
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let request = CreateRawMaterialRequest {
            name: "Pigmento".to_string(),
            material_type: "Insumo".to_string(),
            quantity: -2.0,
            batch_number: "RM-1".to_string(),
            expiration_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            supplier: None,
            storage_location: None,
            notes: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
    }
}
