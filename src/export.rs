// src/export.rs
//! CSV downloads of the main tables. Each export honours the same query
//! filters as the matching list endpoint, without paging.

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use log::info;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::PaginationQuery;
use crate::raw_material_handlers::load_material_views;
use crate::repositories::{CrudRepository, EmployeeRepository, ProductRepository, ProductionRepository};

fn flush_error(e: std::io::Error) -> ApiError {
    ApiError::InternalServerError(format!("CSV export failed: {}", e))
}

fn write_csv(headers: &[&str], rows: Vec<Vec<String>>) -> ApiResult<Vec<u8>> {
    let mut csv_data = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut csv_data);
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer.flush().map_err(flush_error)?;
    }
    Ok(csv_data)
}

fn csv_response(filename: &str, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{}\"", filename)))
        .body(body)
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

pub async fn export_employees(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let employees = EmployeeRepository
        .get_filtered(&app_state.db_pool, &query)
        .await?;

    let rows = employees
        .into_iter()
        .map(|e| vec![
            e.id,
            e.name,
            e.email.unwrap_or_default(),
            e.role,
            if e.active { "active" } else { "inactive" }.to_string(),
            e.created_at.to_rfc3339(),
        ])
        .collect::<Vec<_>>();
    info!("📤 Exporting {} employees", rows.len());

    let body = write_csv(&["ID", "Name", "Email", "Role", "Status", "Created At"], rows)?;
    Ok(csv_response("employees.csv", body))
}

pub async fn export_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let products = ProductRepository
        .get_filtered(&app_state.db_pool, &query)
        .await?;

    let rows = products
        .into_iter()
        .map(|p| {
            let type_label = p.parsed_type().map(|t| t.label().to_string()).unwrap_or_default();
            vec![
                p.id,
                p.name,
                p.code.unwrap_or_default(),
                p.category,
                type_label,
                p.stock.to_string(),
                format!("{:.2}", p.price),
                p.batch_number.unwrap_or_default(),
                opt(&p.manufacturing_date),
                p.order_number.unwrap_or_default(),
                if p.active { "active" } else { "inactive" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    info!("📤 Exporting {} products", rows.len());

    let body = write_csv(
        &[
            "ID", "Name", "Code", "Category", "Type", "Stock", "Price",
            "Batch Number", "Manufacturing Date", "Order Number", "Status",
        ],
        rows,
    )?;
    Ok(csv_response("products.csv", body))
}

pub async fn export_productions(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    query.status_filter()?;
    let records = ProductionRepository
        .all_with_names(&app_state.db_pool, &query)
        .await?;

    let rows = records
        .into_iter()
        .map(|r| {
            let duration = r.record.duration_hours().map(|h| format!("{:.1}", h)).unwrap_or_default();
            vec![
                r.record.id,
                r.record.order_number,
                r.record.batch_number,
                r.product_name.unwrap_or_default(),
                r.employee_name.unwrap_or_default(),
                r.record.status.display_name().to_string(),
                r.record.start_time.to_rfc3339(),
                r.record.end_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                duration,
                r.record.quantity.to_string(),
                r.record.observations.unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    info!("📤 Exporting {} production records", rows.len());

    let body = write_csv(
        &[
            "ID", "Order Number", "Batch Number", "Product", "Employee", "Status",
            "Start Time", "End Time", "Duration (h)", "Quantity", "Observations",
        ],
        rows,
    )?;
    Ok(csv_response("productions.csv", body))
}

pub async fn export_raw_materials(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let views = load_material_views(&app_state, &query).await?;

    let rows = views
        .into_iter()
        .map(|v| vec![
            v.material.id,
            v.material.name,
            v.material.material_type,
            format!("{:.2}", v.material.quantity),
            v.material.batch_number,
            v.material.expiration_date.to_string(),
            v.days_until_expiration.to_string(),
            v.expiration_status.as_str().to_string(),
            v.material.supplier.unwrap_or_default(),
            v.material.storage_location.unwrap_or_default(),
        ])
        .collect::<Vec<_>>();
    info!("📤 Exporting {} raw materials", rows.len());

    let body = write_csv(
        &[
            "ID", "Name", "Type", "Quantity (kg)", "Batch Number", "Expiration Date",
            "Days Until Expiration", "Expiration Status", "Supplier", "Storage Location",
        ],
        rows,
    )?;
    Ok(csv_response("raw_materials.csv", body))
}
