// src/product_handlers.rs
//! Product catalogue handlers

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;
use log::info;

use crate::AppState;
use crate::audit::{audit, ChangeSet};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginationQuery};
use crate::models::{CreateProductRequest, UpdateProductRequest};
use crate::repositories::{CrudRepository, ProductRepository};

pub async fn get_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let page = ProductRepository
        .get_paginated(&app_state.db_pool, &query)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

pub async fn get_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let product = ProductRepository
        .find(&app_state.db_pool, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i64>,
}

/// Products whose stock is strictly below the threshold
pub async fn get_low_stock_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<LowStockQuery>,
) -> ApiResult<HttpResponse> {
    let threshold = query
        .threshold
        .unwrap_or(app_state.config.inventory.low_stock_units);
    if threshold < 0 {
        return Err(ApiError::bad_request("threshold must be non-negative"));
    }

    let products = ProductRepository
        .low_stock(&app_state.db_pool, threshold)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        products,
        format!("Products with stock below {}", threshold),
    )))
}

pub async fn create_product(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateProductRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let product = ProductRepository
        .create(&app_state.db_pool, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.created("name", &product.name);
    changes.created("stock", &product.stock.to_string());
    audit(
        &app_state.db_pool,
        "create",
        "product",
        &product.id,
        &format!("Created product {}", product.name),
        Some(&changes),
        &http_request,
    )
    .await;

    info!("📦 Created product: {} ({})", product.name, product.id);
    Ok(HttpResponse::Created().json(ApiResponse::success(product)))
}

pub async fn update_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateProductRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let product_id = path.into_inner();
    let repo = ProductRepository;

    let before = repo.find(&app_state.db_pool, &product_id).await?;
    let after = repo
        .update(&app_state.db_pool, &product_id, body.into_inner())
        .await?;

    let mut changes = ChangeSet::new();
    changes.add("name", &before.name, &after.name);
    changes.add_opt("code", &before.code, &after.code);
    changes.add("category", &before.category, &after.category);
    changes.add_opt("type", &before.product_type, &after.product_type);
    changes.add("stock", &before.stock, &after.stock);
    changes.add("price", &before.price, &after.price);
    changes.add_opt("batch_number", &before.batch_number, &after.batch_number);
    changes.add_opt("manufacturing_date", &before.manufacturing_date, &after.manufacturing_date);
    changes.add_opt("order_number", &before.order_number, &after.order_number);
    changes.add("active", &before.active, &after.active);

    if changes.has_changes() {
        audit(
            &app_state.db_pool,
            "update",
            "product",
            &product_id,
            &format!("Updated product {}: {}", after.name, changes.to_description()),
            Some(&changes),
            &http_request,
        )
        .await;
        info!("📦 Updated product {}: {}", product_id, changes.to_description());
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(after)))
}

pub async fn delete_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let product_id = path.into_inner();
    let repo = ProductRepository;

    let product = repo.find(&app_state.db_pool, &product_id).await?;

    let references = repo.reference_count(&app_state.db_pool, &product_id).await?;
    if references > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete product '{}': used by {} production records",
            product.name, references
        )));
    }

    repo.delete(&app_state.db_pool, &product_id).await?;

    audit(
        &app_state.db_pool,
        "delete",
        "product",
        &product_id,
        &format!("Deleted product {}", product.name),
        None,
        &http_request,
    )
    .await;

    info!("🗑️ Deleted product: {} ({})", product.name, product_id);
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        (),
        "Product deleted successfully".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    use crate::db::test_support::{test_pool, test_state};
    use crate::repositories::fixtures;

    #[actix_web::test]
    async fn test_create_and_duplicate_product() {
        let pool = test_pool().await;
        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let payload = json!({
            "name": "Gel Shine Clear",
            "category": "Gel",
            "type": "Gel Shine",
            "stock": 25,
            "price": 42.5
        });
        let req = test::TestRequest::post()
            .uri("/api/v1/products")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["type"], "shine_gel");

        let mut duplicate = payload.clone();
        duplicate["name"] = json!("GEL SHINE CLEAR");
        let req = test::TestRequest::post()
            .uri("/api/v1/products")
            .set_json(&duplicate)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let mut blank = payload.clone();
        blank["name"] = json!(" ");
        let req = test::TestRequest::post()
            .uri("/api/v1/products")
            .set_json(&blank)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[actix_web::test]
    async fn test_low_stock_uses_configured_threshold() {
        let pool = test_pool().await;
        fixtures::product(&pool, "A", None, 3).await;
        fixtures::product(&pool, "B", None, 10).await;
        fixtures::product(&pool, "C", None, 15).await;

        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/products/low-stock").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/products/low-stock?threshold=20")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }

    #[actix_web::test]
    async fn test_update_and_delete_product() {
        let pool = test_pool().await;
        let product = fixtures::product(&pool, "Capa Base Flex", Some("flex_base_coat"), 8).await;
        let app = test::init_service(
            App::new().app_data(test_state(pool.clone())).configure(crate::configure_api),
        )
        .await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/products/{}", product.id))
            .set_json(json!({"stock": 30, "type": ""}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["stock"], 30);
        assert!(body["data"]["type"].is_null());

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/products/{}", product.id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/products/{}", product.id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
