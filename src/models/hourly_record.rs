// src/models/hourly_record.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};

use super::{validate_status, ProductionStatus};

/// Periodic reading taken during a production run.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct HourlyRecord {
    pub id: String,
    pub production_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ProductionStatus,
    pub notes: Option<String>,
    pub quantity_produced: i64,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub operator_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHourlyRecordRequest {
    pub timestamp: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_status"))]
    pub status: String,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[validate(range(min = 0, message = "Quantity produced must be non-negative"))]
    pub quantity_produced: i64,
    #[validate(range(min = -273.15, max = 1000.0, message = "Temperature out of range"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.0, message = "Pressure must be non-negative"))]
    pub pressure: Option<f64>,
    #[validate(length(min = 1, message = "Operator is required"))]
    pub operator_id: String,
}

impl CreateHourlyRecordRequest {
    pub fn parsed_status(&self) -> ProductionStatus {
        ProductionStatus::from_str(&self.status).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateHourlyRecordRequest {
    pub timestamp: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[validate(range(min = 0, message = "Quantity produced must be non-negative"))]
    pub quantity_produced: Option<i64>,
    #[validate(range(min = -273.15, max = 1000.0, message = "Temperature out of range"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.0, message = "Pressure must be non-negative"))]
    pub pressure: Option<f64>,
    #[validate(length(min = 1, message = "Operator is required"))]
    pub operator_id: Option<String>,
}
