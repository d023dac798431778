// src/repositories/mod.rs
//! Data access layer: one repository per entity over a shared CRUD trait.

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::SqlitePool;
use serde::Serialize;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{PaginatedResponse, PaginationQuery};

pub mod employee;
pub mod hourly_record;
pub mod product;
pub mod production;
pub mod raw_material;

pub use employee::EmployeeRepository;
pub use hourly_record::HourlyRecordRepository;
pub use product::ProductRepository;
pub use production::ProductionRepository;
pub use raw_material::RawMaterialRepository;

// ==================== WHERE CLAUSE ====================

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Int(value as i64)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for SqlParam {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        SqlParam::Text(value.to_rfc3339())
    }
}

/// Escape LIKE wildcards
pub fn escape_like_pattern(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Parameterised WHERE builder. Column names always come from code,
/// user input only ever travels as bound parameters.
#[derive(Debug, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Vec<SqlParam>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exact(&mut self, column: &'static str, value: impl Into<SqlParam>) -> &mut Self {
        self.conditions.push(format!("{} = ?", column));
        self.params.push(value.into());
        self
    }

    pub fn add_search(&mut self, columns: &[&'static str], term: &str) -> &mut Self {
        if columns.is_empty() || term.trim().is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like_pattern(term.trim()));
        let likes: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        self.conditions.push(format!("({})", likes.join(" OR ")));
        for _ in columns {
            self.params.push(SqlParam::Text(pattern.clone()));
        }
        self
    }

    pub fn add_time_range(
        &mut self,
        column: &'static str,
        from: Option<chrono::DateTime<chrono::Utc>>,
        to: Option<chrono::DateTime<chrono::Utc>>,
    ) -> &mut Self {
        // julianday() compares instants regardless of how the offset was written
        if let Some(from) = from {
            self.conditions.push(format!("julianday({}) >= julianday(?)", column));
            self.params.push(from.into());
        }
        if let Some(to) = to {
            self.conditions.push(format!("julianday({}) <= julianday(?)", column));
            self.params.push(to.into());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn bind<'q, O>(
        &'q self,
        mut query: sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    ) -> sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
        for param in &self.params {
            query = match param {
                SqlParam::Text(s) => query.bind(s.as_str()),
                SqlParam::Int(i) => query.bind(*i),
            };
        }
        query
    }
}

// ==================== CRUD TRAIT ====================

/// Base trait for CRUD operations
#[async_trait]
pub trait CrudRepository<T, CreateDto, UpdateDto>: Send + Sync
where
    T: Serialize + Send + Unpin + for<'r> sqlx::FromRow<'r, SqliteRow>,
    CreateDto: Send + 'static,
    UpdateDto: Send + 'static,
{
    /// Table name in the database
    fn table_name(&self) -> &'static str;

    /// Human readable entity name used in errors
    fn entity_name(&self) -> &'static str;

    fn id_field(&self) -> &'static str {
        "id"
    }

    /// Columns matched by the free-text search
    fn search_fields(&self) -> Vec<&'static str> {
        vec![]
    }

    fn default_sort_field(&self) -> &'static str {
        "created_at"
    }

    fn default_sort_order(&self) -> &'static str {
        "DESC"
    }

    /// Entity specific filters taken from the query string
    fn apply_filters(&self, _query: &PaginationQuery, _filter: &mut WhereClause) {}

    fn not_found(&self, id: &str) -> ApiError {
        ApiError::NotFound(format!("{} with ID '{}' not found", self.entity_name(), id))
    }

    async fn create(&self, pool: &SqlitePool, data: CreateDto) -> ApiResult<T>;

    async fn get_by_id(&self, pool: &SqlitePool, id: &str) -> ApiResult<Option<T>> {
        let query = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );

        let result = sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result)
    }

    /// Like `get_by_id`, but a missing row is an error
    async fn find(&self, pool: &SqlitePool, id: &str) -> ApiResult<T> {
        match self.get_by_id(pool, id).await? {
            Some(entity) => Ok(entity),
            None => Err(self.not_found(id)),
        }
    }

    async fn exists(&self, pool: &SqlitePool, id: &str) -> ApiResult<bool> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );
        let count: (i64,) = sqlx::query_as(&query)
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count.0 > 0)
    }

    async fn get_all(&self, pool: &SqlitePool) -> ApiResult<Vec<T>> {
        let query = format!(
            "SELECT * FROM {} ORDER BY {} {}",
            self.table_name(),
            self.default_sort_field(),
            self.default_sort_order()
        );
        let rows = sqlx::query_as::<_, T>(&query).fetch_all(pool).await?;
        Ok(rows)
    }

    /// Every row matching the search and entity filters, unpaged
    async fn get_filtered(&self, pool: &SqlitePool, query: &PaginationQuery) -> ApiResult<Vec<T>> {
        let filter = self.build_filter(query);
        let sql = format!(
            "SELECT * FROM {}{} ORDER BY {} {}",
            self.table_name(),
            filter.to_sql(),
            self.default_sort_field(),
            self.sort_direction(query)
        );
        let rows = filter.bind(sqlx::query_as::<_, T>(&sql)).fetch_all(pool).await?;
        Ok(rows)
    }

    async fn update(&self, pool: &SqlitePool, id: &str, data: UpdateDto) -> ApiResult<T>;

    async fn delete(&self, pool: &SqlitePool, id: &str) -> ApiResult<()> {
        let query = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );

        let result = sqlx::query(&query)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(id));
        }

        Ok(())
    }

    fn build_filter(&self, query: &PaginationQuery) -> WhereClause {
        let mut filter = WhereClause::new();
        if let Some(term) = query.search_term() {
            filter.add_search(&self.search_fields(), term);
        }
        self.apply_filters(query, &mut filter);
        filter
    }

    fn sort_direction(&self, query: &PaginationQuery) -> &'static str {
        match query.sort_order.as_deref() {
            Some(_) => query.sort_direction(),
            None => self.default_sort_order(),
        }
    }

    /// List with pagination
    async fn get_paginated(
        &self,
        pool: &SqlitePool,
        query: &PaginationQuery,
    ) -> ApiResult<PaginatedResponse<T>> {
        let (page, per_page, offset) = query.normalize();
        let filter = self.build_filter(query);
        let where_sql = filter.to_sql();

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", self.table_name(), where_sql);
        let total: (i64,) = filter
            .bind(sqlx::query_as::<_, (i64,)>(&count_sql))
            .fetch_one(pool)
            .await?;

        let select_sql = format!(
            "SELECT * FROM {}{} ORDER BY {} {} LIMIT ? OFFSET ?",
            self.table_name(),
            where_sql,
            self.default_sort_field(),
            self.sort_direction(query)
        );
        let data: Vec<T> = filter
            .bind(sqlx::query_as::<_, T>(&select_sql))
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(PaginatedResponse::new(data, total.0, page, per_page))
    }
}

/// Seed data shared by repository and handler tests.
#[cfg(test)]
pub mod fixtures {
    use super::*;
    use crate::models::*;
    use chrono::{Duration, Utc};

    pub async fn employee(pool: &SqlitePool, name: &str, role: &str) -> Employee {
        EmployeeRepository
            .create(pool, CreateEmployeeRequest {
                name: name.to_string(),
                email: None,
                role: role.to_string(),
                active: None,
            })
            .await
            .expect("seed employee")
    }

    pub async fn product(pool: &SqlitePool, name: &str, product_type: Option<&str>, stock: i64) -> Product {
        ProductRepository
            .create(pool, CreateProductRequest {
                name: name.to_string(),
                code: None,
                category: "Gel".to_string(),
                product_type: product_type.map(str::to_string),
                stock,
                price: 39.9,
                batch_number: None,
                manufacturing_date: None,
                order_number: None,
                active: None,
            })
            .await
            .expect("seed product")
    }

    pub async fn seed(pool: &SqlitePool) -> (Employee, Product) {
        let employee = employee(pool, "Maria Silva", "Operator").await;
        let product = product(pool, "Gel Construtor Pink", Some("builder_gel"), 40).await;
        (employee, product)
    }

    pub fn production_request(employee_id: &str, product_id: &str) -> CreateProductionRequest {
        CreateProductionRequest {
            employee_id: employee_id.to_string(),
            product_id: product_id.to_string(),
            order_number: "O3001".to_string(),
            batch_number: "L2001".to_string(),
            status: None,
            start_time: None,
            end_time: None,
            quantity: Some(100),
            observations: None,
        }
    }

    /// Inserts a reading directly, bypassing the snapshot checks.
    pub async fn hourly(
        pool: &SqlitePool,
        production_id: &str,
        operator_id: &str,
        status: &str,
        quantity: i64,
    ) -> HourlyRecord {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO hourly_records
               (id, production_id, timestamp, status, quantity_produced, temperature, pressure, operator_id, created_at)
               VALUES (?, ?, ?, ?, ?, 25.0, 1.0, ?, ?)"#,
        )
        .bind(&id)
        .bind(production_id)
        .bind(now)
        .bind(status)
        .bind(quantity)
        .bind(operator_id)
        .bind(now)
        .execute(pool)
        .await
        .expect("seed hourly record");

        HourlyRecordRepository.find(pool, &id).await.expect("read back hourly record")
    }

    /// Material expiring `days` from today.
    pub async fn raw_material(pool: &SqlitePool, name: &str, quantity: f64, days: i64) -> RawMaterial {
        RawMaterialRepository
            .create(pool, CreateRawMaterialRequest {
                name: name.to_string(),
                material_type: "Matéria-Prima".to_string(),
                quantity,
                batch_number: "RM-1".to_string(),
                expiration_date: Utc::now().date_naive() + Duration::days(days),
                supplier: Some("Fornecedor A".to_string()),
                storage_location: None,
                notes: None,
            })
            .await
            .expect("seed raw material")
    }
}
