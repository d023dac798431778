// src/models/production.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};
use strum::{EnumIter, IntoEnumIterator};

use super::{validate_not_blank, validate_status};

// === STATUS ===

/// Production status shared by production runs and hourly snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, EnumIter)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Producing,
    Separating,
    Stopped,
    Finished,
}

impl Default for ProductionStatus {
    fn default() -> Self {
        ProductionStatus::Producing
    }
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Producing => "producing",
            ProductionStatus::Separating => "separating",
            ProductionStatus::Stopped => "stopped",
            ProductionStatus::Finished => "finished",
        }
    }

    /// Accepts the canonical names and the shop-floor labels.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "producing" | "produzindo" => Some(ProductionStatus::Producing),
            "separating" | "sendo separado" => Some(ProductionStatus::Separating),
            "stopped" | "parado" => Some(ProductionStatus::Stopped),
            "finished" | "finalizado" => Some(ProductionStatus::Finished),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProductionStatus::Producing => "Producing",
            ProductionStatus::Separating => "Separating",
            ProductionStatus::Stopped => "Stopped",
            ProductionStatus::Finished => "Finished",
        }
    }

    pub fn display_name_pt(&self) -> &'static str {
        match self {
            ProductionStatus::Producing => "Produzindo",
            ProductionStatus::Separating => "Sendo separado",
            ProductionStatus::Stopped => "Parado",
            ProductionStatus::Finished => "Finalizado",
        }
    }

    /// Producing or separating: the run still occupies the line.
    pub fn is_active(&self) -> bool {
        matches!(self, ProductionStatus::Producing | ProductionStatus::Separating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductionStatus::Finished)
    }

    /// Transition table. Any non-terminal status may move to any other
    /// status; `Finished` is terminal. Same-status assignment is always
    /// allowed and is a no-op.
    pub fn can_transition_to(&self, next: ProductionStatus) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal()
    }

    pub fn allowed_successors(&self) -> Vec<ProductionStatus> {
        ProductionStatus::iter()
            .filter(|next| next != self && self.can_transition_to(*next))
            .collect()
    }
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ProductionStatus,
    pub to: ProductionStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cannot change production status from '{}' to '{}'",
            self.from, self.to
        )
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Changed {
        from: ProductionStatus,
        to: ProductionStatus,
    },
}

// === PRODUCTION RECORD ===

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct ProductionRecord {
    pub id: String,
    pub employee_id: String,
    pub product_id: String,
    pub order_number: String,
    pub batch_number: String,
    pub status: ProductionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub quantity: i64,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionRecord {
    /// Assigns a new status through the transition table.
    ///
    /// Finishing a run stamps `end_time` with `at` unless the caller already
    /// set one; the stamp never precedes `start_time`.
    pub fn apply_status(
        &mut self,
        status: ProductionStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, TransitionError> {
        if self.status == status {
            return Ok(StatusChange::Unchanged);
        }
        if !self.status.can_transition_to(status) {
            return Err(TransitionError { from: self.status, to: status });
        }

        let from = self.status;
        self.status = status;
        if status == ProductionStatus::Finished && self.end_time.is_none() {
            self.end_time = Some(at.max(self.start_time));
        }
        self.updated_at = at;

        Ok(StatusChange::Changed { from, to: status })
    }

    /// Run length in hours, when the run has an end time.
    pub fn duration_hours(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 3_600_000.0)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ProductionRecordWithNames {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: ProductionRecord,
    pub employee_name: Option<String>,
    pub product_name: Option<String>,
}

// === REQUESTS ===

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductionRequest {
    #[validate(length(min = 1, message = "Employee is required"))]
    pub employee_id: String,
    #[validate(length(min = 1, message = "Product is required"))]
    pub product_id: String,
    #[validate(
        length(min = 1, max = 100, message = "Order number must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub order_number: String,
    #[validate(
        length(min = 1, max = 100, message = "Batch number must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub batch_number: String,
    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: Option<i64>,
    #[validate(length(max = 1000, message = "Observations cannot exceed 1000 characters"))]
    pub observations: Option<String>,
}

impl CreateProductionRequest {
    pub fn parsed_status(&self) -> ProductionStatus {
        self.status
            .as_deref()
            .and_then(ProductionStatus::from_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductionRequest {
    #[validate(length(min = 1, message = "Employee is required"))]
    pub employee_id: Option<String>,
    #[validate(length(min = 1, message = "Product is required"))]
    pub product_id: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Order number must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub order_number: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Batch number must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub batch_number: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: Option<i64>,
    #[validate(length(max = 1000, message = "Observations cannot exceed 1000 characters"))]
    pub observations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    /// Explicit completion time; only honoured when finishing.
    pub end_time: Option<DateTime<Utc>>,
}

impl UpdateStatusRequest {
    pub fn parsed_status(&self) -> Option<ProductionStatus> {
        ProductionStatus::from_str(&self.status)
    }
}
