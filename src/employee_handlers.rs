// src/employee_handlers.rs
//! Employee registry handlers

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use log::info;

use crate::AppState;
use crate::audit::{audit, ChangeSet};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginationQuery};
use crate::models::{CreateEmployeeRequest, UpdateEmployeeRequest};
use crate::repositories::{CrudRepository, EmployeeRepository};

// ==================== LIST / GET ====================

pub async fn get_employees(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let page = EmployeeRepository
        .get_paginated(&app_state.db_pool, &query)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

pub async fn get_employee(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let employee = EmployeeRepository
        .find(&app_state.db_pool, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(employee)))
}

// ==================== CREATE ====================

pub async fn create_employee(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateEmployeeRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let employee = EmployeeRepository
        .create(&app_state.db_pool, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.created("name", &employee.name);
    changes.created("role", &employee.role);
    audit(
        &app_state.db_pool,
        "create",
        "employee",
        &employee.id,
        &format!("Created employee {}", employee.name),
        Some(&changes),
        &http_request,
    )
    .await;

    info!("👷 Created employee: {} ({})", employee.name, employee.id);
    Ok(HttpResponse::Created().json(ApiResponse::success(employee)))
}

// ==================== UPDATE ====================

pub async fn update_employee(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateEmployeeRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let employee_id = path.into_inner();
    let repo = EmployeeRepository;

    let before = repo.find(&app_state.db_pool, &employee_id).await?;
    let after = repo
        .update(&app_state.db_pool, &employee_id, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.add("name", &before.name, &after.name);
    changes.add_opt("email", &before.email, &after.email);
    changes.add("role", &before.role, &after.role);
    changes.add("active", &before.active, &after.active);

    if changes.has_changes() {
        audit(
            &app_state.db_pool,
            "update",
            "employee",
            &employee_id,
            &format!("Updated employee {}: {}", after.name, changes.to_description()),
            Some(&changes),
            &http_request,
        )
        .await;
        info!("👷 Updated employee {}: {}", employee_id, changes.to_description());
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(after)))
}

pub async fn toggle_employee_active(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let employee_id = path.into_inner();
    let employee = EmployeeRepository
        .toggle_active(&app_state.db_pool, &employee_id)
        .await?;

    let state = if employee.active { "activated" } else { "deactivated" };
    let mut changes = ChangeSet::new();
    changes.add("active", &!employee.active, &employee.active);
    audit(
        &app_state.db_pool,
        "update",
        "employee",
        &employee_id,
        &format!("Employee {} {}", employee.name, state),
        Some(&changes),
        &http_request,
    )
    .await;

    info!("👷 Employee {} {}", employee_id, state);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        employee,
        format!("Employee {}", state),
    )))
}

// ==================== DELETE ====================

pub async fn delete_employee(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let employee_id = path.into_inner();
    let repo = EmployeeRepository;

    let employee = repo.find(&app_state.db_pool, &employee_id).await?;

    let references = repo.reference_count(&app_state.db_pool, &employee_id).await?;
    if references > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete employee '{}': {} production or hourly records reference it. Deactivate the employee instead",
            employee.name, references
        )));
    }

    repo.delete(&app_state.db_pool, &employee_id).await?;

    audit(
        &app_state.db_pool,
        "delete",
        "employee",
        &employee_id,
        &format!("Deleted employee {}", employee.name),
        None,
        &http_request,
    )
    .await;

    info!("🗑️ Deleted employee: {} ({})", employee.name, employee_id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        (),
        "Employee deleted successfully".to_string(),
    )))
}
