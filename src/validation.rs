// src/validation.rs - Cross-field and business validation
use std::collections::HashMap;
use serde::Serialize;
use regex::Regex;
use lazy_static::lazy_static;
use chrono::{DateTime, Utc};
use crate::error::ApiError;
use crate::models::*;

lazy_static! {
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ._/-]*$").unwrap();
}

// ==================== VALIDATION RESULT ====================

#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub errors: HashMap<String, Vec<String>>,
    pub warnings: HashMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
        for (field, warnings) in other.warnings {
            self.warnings.entry(field).or_default().extend(warnings);
        }
    }

    pub fn log_warnings(&self, context: &str) {
        for (field, warnings) in &self.warnings {
            log::warn!("{}: {}: {}", context, field, warnings.join(", "));
        }
    }

    /// Logs warnings, then fails with every error joined into one message.
    pub fn into_result(self, context: &str) -> Result<(), ApiError> {
        self.log_warnings(context);
        if self.is_valid() {
            return Ok(());
        }

        let mut fields: Vec<_> = self.errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        let message = fields
            .iter()
            .map(|(field, errors)| format!("{}: {}", field, errors.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        Err(ApiError::ValidationError(message))
    }
}

// ==================== FIELD VALIDATORS ====================

pub struct FieldValidator;

impl FieldValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err(format!("{} cannot be empty", field))
        } else {
            Ok(())
        }
    }

    /// Order and batch numbers: letters, digits and simple separators.
    pub fn identifier(value: &str, field: &str) -> Result<(), String> {
        if IDENTIFIER_REGEX.is_match(value.trim()) {
            Ok(())
        } else {
            Err(format!("{} may only contain letters, digits, spaces and . _ / -", field))
        }
    }

    pub fn time_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), String> {
        match end {
            Some(end) if end < start => Err(format!(
                "End time ({}) cannot be before start time ({})",
                end.to_rfc3339(),
                start.to_rfc3339()
            )),
            _ => Ok(()),
        }
    }
}

// ==================== CUSTOM VALIDATION ====================

pub trait CustomValidate {
    fn custom_validate(&self) -> ValidationResult;
}

impl CustomValidate for CreateProductionRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::identifier(&self.order_number, "Order number") {
            result.add_error("order_number", e);
        }
        if let Err(e) = FieldValidator::identifier(&self.batch_number, "Batch number") {
            result.add_error("batch_number", e);
        }
        if let Some(start) = self.start_time {
            if let Err(e) = FieldValidator::time_window(start, self.end_time) {
                result.add_error("end_time", e);
            }
        }

        result
    }
}

impl CustomValidate for UpdateProductionRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(ref order) = self.order_number {
            if let Err(e) = FieldValidator::identifier(order, "Order number") {
                result.add_error("order_number", e);
            }
        }
        if let Some(ref batch) = self.batch_number {
            if let Err(e) = FieldValidator::identifier(batch, "Batch number") {
                result.add_error("batch_number", e);
            }
        }

        result
    }
}

impl CustomValidate for CreateRawMaterialRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::identifier(&self.batch_number, "Batch number") {
            result.add_error("batch_number", e);
        }

        let days = (self.expiration_date - Utc::now().date_naive()).num_days();
        if days < 0 {
            result.add_warning("expiration_date", format!("Material expired {} days ago", -days));
        }

        result
    }
}

// ==================== BUSINESS VALIDATORS ====================

pub struct BusinessValidator;

impl BusinessValidator {
    /// Checks a merged production record before it is written.
    pub fn validate_production(record: &ProductionRecord) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::time_window(record.start_time, record.end_time) {
            result.add_error("end_time", e);
        }
        if record.status.is_terminal() && record.end_time.is_none() {
            result.add_warning("end_time", "Finished production has no end time");
        }

        result
    }

    /// Checks a new hourly snapshot against the latest one of the same run.
    pub fn validate_snapshot(
        latest: Option<&HourlyRecord>,
        status: ProductionStatus,
        timestamp: DateTime<Utc>,
        quantity_produced: i64,
    ) -> Result<ValidationResult, TransitionError> {
        let mut result = ValidationResult::new();

        let Some(latest) = latest else {
            return Ok(result);
        };

        if !latest.status.can_transition_to(status) {
            return Err(TransitionError { from: latest.status, to: status });
        }

        if timestamp > latest.timestamp && quantity_produced < latest.quantity_produced {
            result.add_warning(
                "quantity_produced",
                format!(
                    "Quantity dropped from {} to {} since the previous reading",
                    latest.quantity_produced, quantity_produced
                ),
            );
        }

        Ok(result)
    }
}
