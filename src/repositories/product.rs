// src/repositories/product.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{CrudRepository, WhereClause};
use crate::error::{ApiError, ApiResult};
use crate::handlers::PaginationQuery;
use crate::models::{CreateProductRequest, Product, ProductType, UpdateProductRequest};

pub struct ProductRepository;

/// Stored form of the product type: canonical name, or NULL when untyped.
fn normalize_type(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(ProductType::from_str)
        .map(|t| t.as_str().to_string())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProductRepository {
    async fn ensure_name_free(
        &self,
        pool: &SqlitePool,
        name: &str,
        exclude_id: Option<&str>,
    ) -> ApiResult<()> {
        let existing: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM products WHERE LOWER(name) = LOWER(?) AND id != COALESCE(?, '')",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;

        if existing.0 > 0 {
            return Err(ApiError::product_already_exists(name));
        }
        Ok(())
    }

    pub async fn low_stock(&self, pool: &SqlitePool, threshold: i64) -> ApiResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE stock < ? ORDER BY stock ASC, name ASC",
        )
        .bind(threshold)
        .fetch_all(pool)
        .await?;
        Ok(products)
    }

    pub async fn reference_count(&self, pool: &SqlitePool, id: &str) -> ApiResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM production_records WHERE product_id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl CrudRepository<Product, CreateProductRequest, UpdateProductRequest> for ProductRepository {
    fn table_name(&self) -> &'static str {
        "products"
    }

    fn entity_name(&self) -> &'static str {
        "Product"
    }

    fn search_fields(&self) -> Vec<&'static str> {
        vec!["name", "code", "category", "batch_number", "order_number"]
    }

    fn default_sort_field(&self) -> &'static str {
        "name"
    }

    fn default_sort_order(&self) -> &'static str {
        "ASC"
    }

    fn apply_filters(&self, query: &PaginationQuery, filter: &mut WhereClause) {
        if let Some(active) = query.active {
            filter.add_exact("active", active);
        }
    }

    async fn create(&self, pool: &SqlitePool, data: CreateProductRequest) -> ApiResult<Product> {
        let name = data.name.trim().to_string();
        self.ensure_name_free(pool, &name, None).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO products
               (id, name, code, category, product_type, stock, price, batch_number,
                manufacturing_date, order_number, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&name)
        .bind(trimmed(data.code))
        .bind(data.category.trim())
        .bind(normalize_type(data.product_type.as_deref()))
        .bind(data.stock)
        .bind(data.price)
        .bind(trimmed(data.batch_number))
        .bind(data.manufacturing_date)
        .bind(trimmed(data.order_number))
        .bind(data.active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        self.find(pool, &id).await
    }

    async fn update(
        &self,
        pool: &SqlitePool,
        id: &str,
        data: UpdateProductRequest,
    ) -> ApiResult<Product> {
        let existing = self.find(pool, id).await?;

        let name = match data.name {
            Some(name) => {
                let name = name.trim().to_string();
                if !name.eq_ignore_ascii_case(&existing.name) {
                    self.ensure_name_free(pool, &name, Some(id)).await?;
                }
                name
            }
            None => existing.name,
        };

        // An explicit empty string clears the type
        let product_type = match data.product_type {
            Some(raw) => normalize_type(Some(&raw)),
            None => existing.product_type,
        };

        sqlx::query(
            r#"UPDATE products SET
               name = ?, code = ?, category = ?, product_type = ?, stock = ?, price = ?,
               batch_number = ?, manufacturing_date = ?, order_number = ?, active = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&name)
        .bind(trimmed(data.code).or(existing.code))
        .bind(data.category.map(|c| c.trim().to_string()).unwrap_or(existing.category))
        .bind(product_type)
        .bind(data.stock.unwrap_or(existing.stock))
        .bind(data.price.unwrap_or(existing.price))
        .bind(trimmed(data.batch_number).or(existing.batch_number))
        .bind(data.manufacturing_date.or(existing.manufacturing_date))
        .bind(trimmed(data.order_number).or(existing.order_number))
        .bind(data.active.unwrap_or(existing.active))
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        self.find(pool, id).await
    }
}
