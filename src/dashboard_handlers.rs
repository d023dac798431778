// src/dashboard_handlers.rs
//! Dashboard aggregates. Every request reads fresh rows and recomputes.

use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::error::ApiResult;
use crate::handlers::{ApiResponse, PaginationQuery};
use crate::models::*;
use crate::repositories::{
    CrudRepository, EmployeeRepository, HourlyRecordRepository, ProductRepository,
    ProductionRepository, RawMaterialRepository,
};
use crate::stats::{self, *};

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub employees: EmployeeCounts,
    pub products: ProductInventory,
    pub raw_materials: MaterialInventory,
    pub productions: ProductionStats,
}

#[derive(Debug, Serialize)]
pub struct ProductionDashboard {
    pub stats: ProductionStats,
    pub by_day: Vec<DailyQuantity>,
    pub conditions_by_hour: Vec<HourlyConditions>,
    pub recent: Vec<ProductionRecordWithNames>,
}

#[derive(Debug, Serialize)]
pub struct InventoryDashboard {
    pub products: ProductInventory,
    pub stock_by_type: Vec<TypeStock>,
    pub low_stock_products: Vec<Product>,
    pub raw_materials: MaterialInventory,
    pub attention: Vec<RawMaterialView>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeDashboard {
    pub counts: EmployeeCounts,
    pub top_producers: Vec<EmployeeProduction>,
    pub by_role: Vec<RoleProduction>,
    pub production: Vec<EmployeeProduction>,
}

#[tracing::instrument(skip(app_state))]
pub async fn get_overview(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let pool = &app_state.db_pool;
    let inventory = &app_state.config.inventory;

    let (employees, products, materials, productions) = futures::try_join!(
        EmployeeRepository.get_all(pool),
        ProductRepository.get_all(pool),
        RawMaterialRepository.get_all(pool),
        ProductionRepository.get_all(pool),
    )?;

    let today = Utc::now().date_naive();
    let overview = OverviewResponse {
        employees: employee_counts(&employees),
        products: product_inventory(&products, inventory.low_stock_units),
        raw_materials: material_inventory(&materials, today, inventory),
        productions: production_stats(&productions),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(overview)))
}

#[tracing::instrument(skip(app_state))]
pub async fn get_production_dashboard(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let pool = &app_state.db_pool;
    let now = Utc::now();
    let today = now.date_naive();

    // One window covers both the daily series and the last 24 hours
    let window_start = (today - Duration::days(stats::PRODUCTION_DAYS - 1))
        .and_hms_opt(0, 0, 0)
        .map(|start| start.and_utc())
        .unwrap_or(now - Duration::days(stats::PRODUCTION_DAYS));
    let readings_query = PaginationQuery {
        date_from: Some(window_start),
        ..Default::default()
    };
    let recent_query = PaginationQuery {
        per_page: Some(5),
        ..Default::default()
    };

    let (productions, readings, recent) = futures::try_join!(
        ProductionRepository.get_all(pool),
        HourlyRecordRepository.get_filtered(pool, &readings_query),
        ProductionRepository.list_with_names(pool, &recent_query),
    )?;

    let dashboard = ProductionDashboard {
        stats: production_stats(&productions),
        by_day: production_by_day(&readings, today, stats::PRODUCTION_DAYS),
        conditions_by_hour: conditions_by_hour(&readings, now, stats::READING_HOURS),
        recent: recent.data,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(dashboard)))
}

#[tracing::instrument(skip(app_state))]
pub async fn get_inventory_dashboard(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let pool = &app_state.db_pool;
    let inventory = &app_state.config.inventory;

    let (products, low_stock_products, materials) = futures::try_join!(
        ProductRepository.get_all(pool),
        ProductRepository.low_stock(pool, inventory.low_stock_units),
        RawMaterialRepository.get_all(pool),
    )?;

    let today = Utc::now().date_naive();
    let raw_materials = material_inventory(&materials, today, inventory);
    let attention = materials
        .into_iter()
        .map(|m| material_view(m, today, inventory))
        .filter(|view| view.low_stock || view.expiration_status != ExpirationStatus::Valid)
        .collect();

    let dashboard = InventoryDashboard {
        products: product_inventory(&products, inventory.low_stock_units),
        stock_by_type: stock_by_type(&products),
        low_stock_products,
        raw_materials,
        attention,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(dashboard)))
}

#[tracing::instrument(skip(app_state))]
pub async fn get_employee_dashboard(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let pool = &app_state.db_pool;

    let (employees, productions) = futures::try_join!(
        EmployeeRepository.get_all(pool),
        ProductionRepository.get_all(pool),
    )?;

    let production = employee_production(&employees, &productions);
    let dashboard = EmployeeDashboard {
        counts: employee_counts(&employees),
        top_producers: top_producers(&production, stats::TOP_PRODUCERS),
        by_role: productions_by_role(&production),
        production,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(dashboard)))
}
