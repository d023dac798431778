// src/models/mod.rs

pub mod employee;
pub mod hourly_record;
pub mod product;
pub mod production;
pub mod raw_material;

pub use employee::*;
pub use hourly_record::*;
pub use product::*;
pub use production::*;
pub use raw_material::*;

// === VALIDATORS ===

/// Required text must carry something other than whitespace.
pub(crate) fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("blank");
        error.message = Some("Field cannot be blank".into());
        Err(error)
    } else {
        Ok(())
    }
}

pub(crate) fn validate_status(value: &str) -> Result<(), validator::ValidationError> {
    if ProductionStatus::from_str(value).is_some() {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("invalid_status");
        error.message =
            Some("Status must be one of: producing, separating, stopped, finished".into());
        Err(error)
    }
}

pub(crate) fn validate_product_type(value: &str) -> Result<(), validator::ValidationError> {
    if value.is_empty() || ProductType::from_str(value).is_some() {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("invalid_product_type");
        error.message = Some("Unknown product type".into());
        Err(error)
    }
}
