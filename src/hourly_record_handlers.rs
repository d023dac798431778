// src/hourly_record_handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use log::info;

use crate::AppState;
use crate::audit::{audit, ChangeSet};
use crate::error::ApiResult;
use crate::handlers::{ApiResponse, PaginationQuery};
use crate::models::UpdateHourlyRecordRequest;
use crate::repositories::{CrudRepository, HourlyRecordRepository};

pub async fn get_hourly_records(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    query.status_filter()?;
    let page = HourlyRecordRepository
        .get_paginated(&app_state.db_pool, &query)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

pub async fn get_hourly_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let record = HourlyRecordRepository
        .find(&app_state.db_pool, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

pub async fn update_hourly_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateHourlyRecordRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let record_id = path.into_inner();
    let repo = HourlyRecordRepository;

    let before = repo.find(&app_state.db_pool, &record_id).await?;
    let after = repo
        .update(&app_state.db_pool, &record_id, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.add("timestamp", &before.timestamp, &after.timestamp);
    changes.add("status", &before.status, &after.status);
    changes.add_opt("notes", &before.notes, &after.notes);
    changes.add("quantity_produced", &before.quantity_produced, &after.quantity_produced);
    changes.add_opt("temperature", &before.temperature, &after.temperature);
    changes.add_opt("pressure", &before.pressure, &after.pressure);
    changes.add("operator_id", &before.operator_id, &after.operator_id);

    if changes.has_changes() {
        audit(
            &app_state.db_pool,
            "update",
            "hourly_record",
            &record_id,
            &format!("Corrected hourly record: {}", changes.to_description()),
            Some(&changes),
            &http_request,
        )
        .await;
        info!("⏱️ Updated hourly record {}: {}", record_id, changes.to_description());
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(after)))
}

pub async fn delete_hourly_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let record_id = path.into_inner();
    let repo = HourlyRecordRepository;

    let record = repo.find(&app_state.db_pool, &record_id).await?;
    repo.delete(&app_state.db_pool, &record_id).await?;

    audit(
        &app_state.db_pool,
        "delete",
        "hourly_record",
        &record_id,
        &format!("Deleted hourly record of production {}", record.production_id),
        None,
        &http_request,
    )
    .await;

    info!("🗑️ Deleted hourly record {}", record_id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        (),
        "Hourly record deleted successfully".to_string(),
    )))
}
