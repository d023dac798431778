// src/production_handlers.rs
//! Production orders, their status lifecycle and hourly readings

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use log::{info, warn};

use crate::AppState;
use crate::audit::{audit, ChangeSet};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginationQuery};
use crate::models::*;
use crate::repositories::hourly_record::NewHourlyRecord;
use crate::repositories::{CrudRepository, HourlyRecordRepository, ProductionRepository};
use crate::validation::CustomValidate;

// ==================== LIST / GET ====================

pub async fn get_productions(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    query.status_filter()?;
    let page = ProductionRepository
        .list_with_names(&app_state.db_pool, &query)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

pub async fn get_production(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let production = ProductionRepository
        .get_with_names(&app_state.db_pool, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(production)))
}

// ==================== CREATE / UPDATE ====================

pub async fn create_production(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateProductionRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    body.custom_validate().into_result("create production")?;

    let repo = ProductionRepository;
    let record = repo.create(&app_state.db_pool, body.into_inner()).await?;

    let mut changes = ChangeSet::new();
    changes.created("order_number", &record.order_number);
    changes.created("batch_number", &record.batch_number);
    changes.created("status", record.status.as_str());
    audit(
        &app_state.db_pool,
        "create",
        "production",
        &record.id,
        &format!("Created production order {} (batch {})", record.order_number, record.batch_number),
        Some(&changes),
        &http_request,
    )
    .await;

    info!("🏭 Created production {} for order {}", record.id, record.order_number);
    let created = repo.get_with_names(&app_state.db_pool, &record.id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}

pub async fn update_production(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateProductionRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    body.custom_validate().into_result("update production")?;
    let production_id = path.into_inner();
    let repo = ProductionRepository;

    let before = repo.find(&app_state.db_pool, &production_id).await?;
    let after = repo
        .update(&app_state.db_pool, &production_id, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.add("employee_id", &before.employee_id, &after.employee_id);
    changes.add("product_id", &before.product_id, &after.product_id);
    changes.add("order_number", &before.order_number, &after.order_number);
    changes.add("batch_number", &before.batch_number, &after.batch_number);
    changes.add("start_time", &before.start_time, &after.start_time);
    changes.add_opt("end_time", &before.end_time, &after.end_time);
    changes.add("quantity", &before.quantity, &after.quantity);
    changes.add_opt("observations", &before.observations, &after.observations);

    if changes.has_changes() {
        audit(
            &app_state.db_pool,
            "update",
            "production",
            &production_id,
            &format!("Updated production {}: {}", after.order_number, changes.to_description()),
            Some(&changes),
            &http_request,
        )
        .await;
        info!("🏭 Updated production {}: {}", production_id, changes.to_description());
    }

    let updated = repo.get_with_names(&app_state.db_pool, &production_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

// ==================== STATUS ====================

pub async fn update_production_status(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let production_id = path.into_inner();
    let status = body.parsed_status().ok_or_else(|| {
        ApiError::ValidationError(format!(
            "Unknown production status '{}' (expected producing, separating, stopped or finished)",
            body.status
        ))
    })?;

    let repo = ProductionRepository;
    let (record, change) = match repo
        .change_status(&app_state.db_pool, &production_id, status, body.end_time)
        .await
    {
        Ok(result) => result,
        Err(ApiError::Conflict(msg)) => {
            warn!("⛔ Rejected status change for {}: {}", production_id, msg);
            return Err(ApiError::Conflict(msg));
        }
        Err(e) => return Err(e),
    };

    let message = match change {
        StatusChange::Unchanged => format!("Status already {}", record.status.display_name()),
        StatusChange::Changed { from, to } => {
            let mut changes = ChangeSet::new();
            changes.add("status", &from, &to);
            changes.add_opt("end_time", &None, &record.end_time.filter(|_| to.is_terminal()));
            audit(
                &app_state.db_pool,
                "status_change",
                "production",
                &production_id,
                &format!(
                    "Production {} moved from {} to {}",
                    record.order_number,
                    from.display_name(),
                    to.display_name()
                ),
                Some(&changes),
                &http_request,
            )
            .await;

            info!("🔄 Production {} status: {} → {}", production_id, from, to);
            format!("Status changed from {} to {}", from.display_name(), to.display_name())
        }
    };

    let production = repo.get_with_names(&app_state.db_pool, &production_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(production, message)))
}

// ==================== DELETE ====================

pub async fn delete_production(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let production_id = path.into_inner();
    let repo = ProductionRepository;

    let record = repo.find(&app_state.db_pool, &production_id).await?;
    let readings = repo.hourly_count(&app_state.db_pool, &production_id).await?;

    // hourly_records go with it through ON DELETE CASCADE
    repo.delete(&app_state.db_pool, &production_id).await?;

    audit(
        &app_state.db_pool,
        "delete",
        "production",
        &production_id,
        &format!(
            "Deleted production order {} and {} hourly records",
            record.order_number, readings
        ),
        None,
        &http_request,
    )
    .await;

    info!("🗑️ Deleted production {} ({} hourly records)", production_id, readings);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        (),
        format!("Production deleted with {} hourly records", readings),
    )))
}

// ==================== HOURLY READINGS ====================

pub async fn get_production_hourly_records(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let records = HourlyRecordRepository
        .list_for_production(&app_state.db_pool, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(records)))
}

pub async fn create_hourly_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<CreateHourlyRecordRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let production_id = path.into_inner();

    let record = HourlyRecordRepository
        .create(&app_state.db_pool, NewHourlyRecord {
            production_id: production_id.clone(),
            data: body.into_inner(),
        })
        .await?;

    let mut changes = ChangeSet::new();
    changes.created("status", record.status.as_str());
    changes.created("quantity_produced", &record.quantity_produced.to_string());
    audit(
        &app_state.db_pool,
        "create",
        "hourly_record",
        &record.id,
        &format!("Recorded {} units for production {}", record.quantity_produced, production_id),
        Some(&changes),
        &http_request,
    )
    .await;

    info!("⏱️ Hourly record {} added to production {}", record.id, production_id);
    Ok(HttpResponse::Created().json(ApiResponse::success(record)))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    use crate::db::test_support::{test_pool, test_state};
    use crate::repositories::fixtures;

    #[actix_web::test]
    async fn test_status_endpoint_lifecycle() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/productions")
            .set_json(json!({
                "employee_id": employee.id,
                "product_id": product.id,
                "order_number": "O3001",
                "batch_number": "L2001",
                "quantity": 120
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["status"], "producing");
        assert_eq!(body["data"]["employee_name"], "Maria Silva");

        let status_uri = format!("/api/v1/productions/{}/status", id);

        let req = test::TestRequest::put()
            .uri(&status_uri)
            .set_json(json!({"status": "sendo separado"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "separating");
        assert!(body["data"]["end_time"].is_null());

        let req = test::TestRequest::put()
            .uri(&status_uri)
            .set_json(json!({"status": "finished"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "finished");
        assert!(body["data"]["end_time"].is_string());
        let end_time = body["data"]["end_time"].clone();

        // Same status again: accepted, nothing changes
        let req = test::TestRequest::put()
            .uri(&status_uri)
            .set_json(json!({"status": "finished"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["end_time"], end_time);

        let req = test::TestRequest::put()
            .uri(&status_uri)
            .set_json(json!({"status": "producing"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::put()
            .uri(&status_uri)
            .set_json(json!({"status": "paused"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap_or_default().contains("'paused'"));

        let changes = crate::audit::recent_activity(&pool, Some("production"), 10).await.unwrap();
        let status_changes = changes.iter().filter(|e| e.action == "status_change").count();
        assert_eq!(status_changes, 2);
    }

    #[actix_web::test]
    async fn test_end_before_start_rejected() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/productions")
            .set_json(json!({
                "employee_id": employee.id,
                "product_id": product.id,
                "order_number": "O3001",
                "batch_number": "L2001",
                "start_time": "2026-03-10T10:00:00Z",
                "end_time": "2026-03-10T09:00:00Z"
            }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[actix_web::test]
    async fn test_hourly_readings_and_cascade() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/productions")
            .set_json(json!({
                "employee_id": employee.id,
                "product_id": product.id,
                "order_number": "O3002",
                "batch_number": "L2002"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let hourly_uri = format!("/api/v1/productions/{}/hourly", id);

        for (hour, status, quantity) in [("08", "producing", 30), ("09", "stopped", 25)] {
            let req = test::TestRequest::post()
                .uri(&hourly_uri)
                .set_json(json!({
                    "timestamp": format!("2026-03-10T{}:00:00Z", hour),
                    "status": status,
                    "quantity_produced": quantity,
                    "temperature": 31.5,
                    "operator_id": employee.id
                }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri(&hourly_uri).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let readings = body["data"].as_array().unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1]["status"], "stopped");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/productions/{}", id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);

        let left: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hourly_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left.0, 0);

        let req = test::TestRequest::get().uri(&hourly_uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_unknown_status_filter_is_bad_request() {
        let pool = test_pool().await;
        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/productions?status=cancelled")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/v1/productions?status=finished")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total"], 0);
    }
}
