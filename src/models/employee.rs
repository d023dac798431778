// src/models/employee.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};

use super::validate_not_blank;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateEmployeeRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Role must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub role: String,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct UpdateEmployeeRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Role must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub role: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_employee_validation() {
        let request = CreateEmployeeRequest {
            name: "Maria Silva".to_string(),
            email: Some("maria@factory.local".to_string()),
            role: "Operator".to_string(),
            active: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_blank_name_rejected() {
        let request = CreateEmployeeRequest {
            name: "  \t".to_string(),
            email: None,
            role: "Operator".to_string(),
            active: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_bad_email_rejected() {
        let request = UpdateEmployeeRequest {
            name: None,
            email: Some("not-an-email".to_string()),
            role: None,
            active: Some(false),
        };
        assert!(request.validate().is_err());
    }
}
