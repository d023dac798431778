// src/handlers.rs
use actix_web::{web, HttpResponse};
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::ProductionStatus;

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            data,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub active: Option<bool>,
    pub employee_id: Option<String>,
    pub product_id: Option<String>,
    pub production_id: Option<String>,
    pub expiration: Option<String>,
    pub sort_order: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl PaginationQuery {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }

    /// Only ASC and DESC reach the SQL text; anything else means DESC.
    pub fn sort_direction(&self) -> &'static str {
        match self.sort_order.as_deref() {
            Some(order) if order.eq_ignore_ascii_case("asc") => "ASC",
            _ => "DESC",
        }
    }

    /// The `status` filter, rejected when it names no known status.
    pub fn status_filter(&self) -> ApiResult<Option<ProductionStatus>> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(raw) => ProductionStatus::from_str(raw)
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown status filter '{}'", raw))),
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Page through a list that was filtered in memory.
pub fn paginate<T>(items: Vec<T>, query: &PaginationQuery) -> PaginatedResponse<T> {
    let (page, per_page, offset) = query.normalize();
    let total = items.len() as i64;
    let data = items
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .collect();
    PaginatedResponse::new(data, total, page, per_page)
}

// ==================== RECENT ACTIVITY ====================

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
    pub entity_type: Option<String>,
}

pub async fn get_recent_activity(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<ActivityQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let entries = crate::audit::recent_activity(
        &app_state.db_pool,
        query.entity_type.as_deref(),
        limit,
    )
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(entries)))
}
