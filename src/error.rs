use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::models::TransitionError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(err) => {
                log::error!("Database error: {}", err);
                HttpResponse::InternalServerError().json(error_response)
            }
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::InternalServerError(format!("CSV export failed: {}", err))
    }
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} not found", entity))
    }

    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn employee_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Employee with ID '{}' not found", id))
    }

    pub fn product_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Product with ID '{}' not found", id))
    }

    pub fn production_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Production record with ID '{}' not found", id))
    }

    pub fn raw_material_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Raw material with ID '{}' not found", id))
    }

    pub fn hourly_record_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Hourly record with ID '{}' not found", id))
    }

    pub fn product_already_exists(name: &str) -> Self {
        ApiError::Conflict(format!("Product '{}' already exists", name))
    }

    pub fn employee_email_taken(email: &str) -> Self {
        ApiError::Conflict(format!("Employee with email '{}' already exists", email))
    }
}
