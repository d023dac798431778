// src/raw_material_handlers.rs
//! Raw material stock, annotated with expiration status on every read

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;
use log::info;

use crate::AppState;
use crate::audit::{audit, ChangeSet};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{paginate, ApiResponse, PaginationQuery};
use crate::models::*;
use crate::repositories::{CrudRepository, RawMaterialRepository};
use crate::stats;
use crate::validation::CustomValidate;

fn expiration_filter(query: &PaginationQuery) -> ApiResult<Option<ExpirationStatus>> {
    match query.expiration.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some("all") => Ok(None),
        Some(raw) => ExpirationStatus::from_str(raw).map(Some).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Unknown expiration filter '{}' (expected expired, expiring or valid)",
                raw
            ))
        }),
    }
}

/// Materials matching the query, with their expiration bucket as of today.
pub(crate) async fn load_material_views(
    app_state: &AppState,
    query: &PaginationQuery,
) -> ApiResult<Vec<RawMaterialView>> {
    let wanted = expiration_filter(query)?;
    let today = Utc::now().date_naive();

    let materials = RawMaterialRepository
        .get_filtered(&app_state.db_pool, query)
        .await?;

    Ok(materials
        .into_iter()
        .map(|m| stats::material_view(m, today, &app_state.config.inventory))
        .filter(|view| wanted.map_or(true, |w| view.expiration_status == w))
        .collect())
}

pub async fn get_raw_materials(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let views = load_material_views(&app_state, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(paginate(views, &query))))
}

pub async fn get_raw_material(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let material = RawMaterialRepository
        .find(&app_state.db_pool, &path.into_inner())
        .await?;
    let view = stats::material_view(material, Utc::now().date_naive(), &app_state.config.inventory);

    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn create_raw_material(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateRawMaterialRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    body.custom_validate().into_result("create raw material")?;

    let material = RawMaterialRepository
        .create(&app_state.db_pool, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.created("name", &material.name);
    changes.created("quantity", &material.quantity.to_string());
    changes.created("expiration_date", &material.expiration_date.to_string());
    audit(
        &app_state.db_pool,
        "create",
        "raw_material",
        &material.id,
        &format!("Registered raw material {} ({} kg)", material.name, material.quantity),
        Some(&changes),
        &http_request,
    )
    .await;

    info!("🧪 Created raw material: {} ({})", material.name, material.id);
    let view = stats::material_view(material, Utc::now().date_naive(), &app_state.config.inventory);
    Ok(HttpResponse::Created().json(ApiResponse::success(view)))
}

pub async fn update_raw_material(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateRawMaterialRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let material_id = path.into_inner();
    let repo = RawMaterialRepository;

    let before = repo.find(&app_state.db_pool, &material_id).await?;
    let after = repo
        .update(&app_state.db_pool, &material_id, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.add("name", &before.name, &after.name);
    changes.add("type", &before.material_type, &after.material_type);
    changes.add("quantity", &before.quantity, &after.quantity);
    changes.add("batch_number", &before.batch_number, &after.batch_number);
    changes.add("expiration_date", &before.expiration_date, &after.expiration_date);
    changes.add_opt("supplier", &before.supplier, &after.supplier);
    changes.add_opt("storage_location", &before.storage_location, &after.storage_location);
    changes.add_opt("notes", &before.notes, &after.notes);

    if changes.has_changes() {
        audit(
            &app_state.db_pool,
            "update",
            "raw_material",
            &material_id,
            &format!("Updated raw material {}: {}", after.name, changes.to_description()),
            Some(&changes),
            &http_request,
        )
        .await;
        info!("🧪 Updated raw material {}: {}", material_id, changes.to_description());
    }

    let view = stats::material_view(after, Utc::now().date_naive(), &app_state.config.inventory);
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn delete_raw_material(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let material_id = path.into_inner();
    let repo = RawMaterialRepository;

    let material = repo.find(&app_state.db_pool, &material_id).await?;
    repo.delete(&app_state.db_pool, &material_id).await?;

    audit(
        &app_state.db_pool,
        "delete",
        "raw_material",
        &material_id,
        &format!("Deleted raw material {}", material.name),
        None,
        &http_request,
    )
    .await;

    info!("🗑️ Deleted raw material: {} ({})", material.name, material_id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        (),
        "Raw material deleted successfully".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use serde_json::{json, Value};

    use crate::db::test_support::{test_pool, test_state};
    use crate::repositories::fixtures;

    #[test]
    fn test_expiration_filter_parsing() {
        let mut query = PaginationQuery::default();
        assert_eq!(expiration_filter(&query).unwrap(), None);
        query.expiration = Some("all".to_string());
        assert_eq!(expiration_filter(&query).unwrap(), None);
        query.expiration = Some("Expiring".to_string());
        assert_eq!(expiration_filter(&query).unwrap(), Some(ExpirationStatus::Expiring));
        query.expiration = Some("stale".to_string());
        assert!(expiration_filter(&query).is_err());
    }

    #[actix_web::test]
    async fn test_expiration_filter_partitions_list() {
        let pool = test_pool().await;
        fixtures::raw_material(&pool, "Resina UV", 50.0, -5).await;
        fixtures::raw_material(&pool, "Fotoiniciador", 10.0, 10).await;
        fixtures::raw_material(&pool, "Pigmento", 30.0, 90).await;

        let app = actix_test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let mut seen = 0;
        for (bucket, expected) in [("expired", "Resina UV"), ("expiring", "Fotoiniciador"), ("valid", "Pigmento")] {
            let req = actix_test::TestRequest::get()
                .uri(&format!("/api/v1/raw-materials?expiration={}", bucket))
                .to_request();
            let body: Value = actix_test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["data"]["total"], 1, "bucket {}", bucket);
            assert_eq!(body["data"]["data"][0]["name"], expected);
            assert_eq!(body["data"]["data"][0]["expiration_status"], bucket);
            seen += body["data"]["total"].as_i64().unwrap();
        }

        let req = actix_test::TestRequest::get().uri("/api/v1/raw-materials").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total"].as_i64().unwrap(), seen);

        let low = body["data"]["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|m| m["low_stock"] == true)
            .count();
        assert_eq!(low, 1);
    }

    #[actix_web::test]
    async fn test_create_and_update_material() {
        let pool = test_pool().await;
        let app = actix_test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/raw-materials")
            .set_json(json!({
                "name": "Resina UV",
                "type": "Matéria-Prima",
                "quantity": 25.5,
                "batch_number": "RM-2041",
                "expiration_date": "2099-03-01"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["data"]["type"], "Matéria-Prima");
        assert_eq!(body["data"]["expiration_status"], "valid");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = actix_test::TestRequest::put()
            .uri(&format!("/api/v1/raw-materials/{}", id))
            .set_json(json!({"quantity": 5.0}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["quantity"], 5.0);
        assert_eq!(body["data"]["low_stock"], true);

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/raw-materials?expiration=rotten")
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
