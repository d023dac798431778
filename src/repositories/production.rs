// src/repositories/production.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{CrudRepository, EmployeeRepository, ProductRepository, WhereClause};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{PaginatedResponse, PaginationQuery};
use crate::models::*;
use crate::validation::{BusinessValidator, FieldValidator};

pub struct ProductionRepository;

const SELECT_WITH_NAMES: &str = r#"SELECT production_records.*,
        e.name AS employee_name,
        p.name AS product_name
    FROM production_records
    LEFT JOIN employees e ON e.id = production_records.employee_id
    LEFT JOIN products p ON p.id = production_records.product_id"#;

const NAMED_SEARCH_FIELDS: [&str; 4] = [
    "production_records.order_number",
    "production_records.batch_number",
    "e.name",
    "p.name",
];

impl ProductionRepository {
    async fn ensure_references(
        &self,
        pool: &SqlitePool,
        employee_id: &str,
        product_id: &str,
    ) -> ApiResult<()> {
        if !EmployeeRepository.exists(pool, employee_id).await? {
            return Err(ApiError::employee_not_found(employee_id));
        }
        if !ProductRepository.exists(pool, product_id).await? {
            return Err(ApiError::product_not_found(product_id));
        }
        Ok(())
    }

    fn named_filter(&self, query: &PaginationQuery) -> WhereClause {
        let mut filter = WhereClause::new();
        if let Some(term) = query.search_term() {
            filter.add_search(&NAMED_SEARCH_FIELDS, term);
        }
        self.apply_filters(query, &mut filter);
        filter
    }

    pub async fn get_with_names(
        &self,
        pool: &SqlitePool,
        id: &str,
    ) -> ApiResult<ProductionRecordWithNames> {
        let sql = format!("{} WHERE production_records.id = ?", SELECT_WITH_NAMES);
        sqlx::query_as::<_, ProductionRecordWithNames>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::production_not_found(id))
    }

    /// Paginated listing joined with employee and product names.
    pub async fn list_with_names(
        &self,
        pool: &SqlitePool,
        query: &PaginationQuery,
    ) -> ApiResult<PaginatedResponse<ProductionRecordWithNames>> {
        let (page, per_page, offset) = query.normalize();
        let filter = self.named_filter(query);
        let where_sql = filter.to_sql();

        let count_sql = format!(
            r#"SELECT COUNT(*) FROM production_records
               LEFT JOIN employees e ON e.id = production_records.employee_id
               LEFT JOIN products p ON p.id = production_records.product_id{}"#,
            where_sql
        );
        let total: (i64,) = filter
            .bind(sqlx::query_as::<_, (i64,)>(&count_sql))
            .fetch_one(pool)
            .await?;

        let select_sql = format!(
            "{}{} ORDER BY production_records.start_time {} LIMIT ? OFFSET ?",
            SELECT_WITH_NAMES,
            where_sql,
            self.sort_direction(query)
        );
        let data = filter
            .bind(sqlx::query_as::<_, ProductionRecordWithNames>(&select_sql))
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(PaginatedResponse::new(data, total.0, page, per_page))
    }

    /// Every matching record, unpaged. Used by the CSV export.
    pub async fn all_with_names(
        &self,
        pool: &SqlitePool,
        query: &PaginationQuery,
    ) -> ApiResult<Vec<ProductionRecordWithNames>> {
        let filter = self.named_filter(query);
        let sql = format!(
            "{}{} ORDER BY production_records.start_time {}",
            SELECT_WITH_NAMES,
            filter.to_sql(),
            self.sort_direction(query)
        );
        let rows = filter
            .bind(sqlx::query_as::<_, ProductionRecordWithNames>(&sql))
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Moves a production to `status`. Same-status requests write nothing.
    ///
    /// The write only lands if the stored status is still the one the
    /// transition was checked against. A request that loses a race with
    /// another status change gets 409 instead of overwriting it.
    pub async fn change_status(
        &self,
        pool: &SqlitePool,
        id: &str,
        status: ProductionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> ApiResult<(ProductionRecord, StatusChange)> {
        let mut record = self.find(pool, id).await?;

        if status == ProductionStatus::Finished && !record.status.is_terminal() {
            if let Some(end) = end_time {
                FieldValidator::time_window(record.start_time, Some(end))
                    .map_err(ApiError::ValidationError)?;
                if record.end_time.is_none() {
                    record.end_time = Some(end);
                }
            }
        } else if end_time.is_some() {
            log::debug!("Ignoring end_time for status change of {} to {}", id, status);
        }

        let from = record.status;
        let change = record.apply_status(status, Utc::now())?;
        if change == StatusChange::Unchanged {
            return Ok((record, change));
        }

        let result = sqlx::query(
            "UPDATE production_records SET status = ?, end_time = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(record.status)
        .bind(record.end_time)
        .bind(record.updated_at)
        .bind(id)
        .bind(from)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.lost_status_race(pool, id, status).await;
        }

        Ok((record, change))
    }

    async fn lost_status_race(
        &self,
        pool: &SqlitePool,
        id: &str,
        status: ProductionStatus,
    ) -> ApiResult<(ProductionRecord, StatusChange)> {
        let current = self.find(pool, id).await?;
        if current.status == status {
            return Ok((current, StatusChange::Unchanged));
        }
        if !current.status.can_transition_to(status) {
            return Err(TransitionError { from: current.status, to: status }.into());
        }
        log::warn!(
            "Status change of production {} to {} lost to a concurrent change (now {})",
            id, status, current.status
        );
        Err(ApiError::Conflict(format!(
            "Production {} changed status concurrently (now '{}'), retry the request",
            id, current.status
        )))
    }

    pub async fn hourly_count(&self, pool: &SqlitePool, id: &str) -> ApiResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hourly_records WHERE production_id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl CrudRepository<ProductionRecord, CreateProductionRequest, UpdateProductionRequest>
    for ProductionRepository
{
    fn table_name(&self) -> &'static str {
        "production_records"
    }

    fn entity_name(&self) -> &'static str {
        "Production record"
    }

    fn search_fields(&self) -> Vec<&'static str> {
        vec!["production_records.order_number", "production_records.batch_number"]
    }

    fn default_sort_field(&self) -> &'static str {
        "production_records.start_time"
    }

    fn apply_filters(&self, query: &PaginationQuery, filter: &mut WhereClause) {
        if let Some(status) = query.status.as_deref().and_then(ProductionStatus::from_str) {
            filter.add_exact("production_records.status", status.as_str());
        }
        if let Some(ref employee_id) = query.employee_id {
            filter.add_exact("production_records.employee_id", employee_id.as_str());
        }
        if let Some(ref product_id) = query.product_id {
            filter.add_exact("production_records.product_id", product_id.as_str());
        }
        filter.add_time_range("production_records.start_time", query.date_from, query.date_to);
    }

    fn not_found(&self, id: &str) -> ApiError {
        ApiError::production_not_found(id)
    }

    async fn create(
        &self,
        pool: &SqlitePool,
        data: CreateProductionRequest,
    ) -> ApiResult<ProductionRecord> {
        self.ensure_references(pool, &data.employee_id, &data.product_id).await?;

        let now = Utc::now();
        let status = data.parsed_status();
        let start_time = data.start_time.unwrap_or(now);

        let mut record = ProductionRecord {
            id: Uuid::new_v4().to_string(),
            employee_id: data.employee_id,
            product_id: data.product_id,
            order_number: data.order_number.trim().to_string(),
            batch_number: data.batch_number.trim().to_string(),
            status: ProductionStatus::Producing,
            start_time,
            end_time: data.end_time,
            quantity: data.quantity.unwrap_or(0),
            observations: data.observations,
            created_at: now,
            updated_at: now,
        };
        record.apply_status(status, now)?;
        BusinessValidator::validate_production(&record).into_result("create production")?;

        sqlx::query(
            r#"INSERT INTO production_records
               (id, employee_id, product_id, order_number, batch_number, status,
                start_time, end_time, quantity, observations, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.id)
        .bind(&record.employee_id)
        .bind(&record.product_id)
        .bind(&record.order_number)
        .bind(&record.batch_number)
        .bind(record.status)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.quantity)
        .bind(&record.observations)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(pool)
        .await?;

        Ok(record)
    }

    async fn update(
        &self,
        pool: &SqlitePool,
        id: &str,
        data: UpdateProductionRequest,
    ) -> ApiResult<ProductionRecord> {
        let existing = self.find(pool, id).await?;
        let mut record = existing.clone();

        if let Some(employee_id) = data.employee_id {
            record.employee_id = employee_id;
        }
        if let Some(product_id) = data.product_id {
            record.product_id = product_id;
        }
        if let Some(order_number) = data.order_number {
            record.order_number = order_number.trim().to_string();
        }
        if let Some(batch_number) = data.batch_number {
            record.batch_number = batch_number.trim().to_string();
        }
        if let Some(start_time) = data.start_time {
            record.start_time = start_time;
        }
        let requested_end = data.end_time;
        if let Some(end_time) = requested_end {
            record.end_time = Some(end_time);
        }
        if let Some(quantity) = data.quantity {
            record.quantity = quantity;
        }
        if data.observations.is_some() {
            record.observations = data.observations;
        }

        if record.employee_id != existing.employee_id || record.product_id != existing.product_id {
            self.ensure_references(pool, &record.employee_id, &record.product_id).await?;
        }
        BusinessValidator::validate_production(&record).into_result("update production")?;

        if record == existing {
            return Ok(existing);
        }
        record.updated_at = Utc::now();

        // Status is owned by change_status; an end_time stamped by a
        // concurrent finish is kept unless the request sets one.
        sqlx::query(
            r#"UPDATE production_records SET
               employee_id = ?, product_id = ?, order_number = ?, batch_number = ?,
               start_time = ?, end_time = COALESCE(?, end_time), quantity = ?,
               observations = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&record.employee_id)
        .bind(&record.product_id)
        .bind(&record.order_number)
        .bind(&record.batch_number)
        .bind(record.start_time)
        .bind(requested_end)
        .bind(record.quantity)
        .bind(&record.observations)
        .bind(record.updated_at)
        .bind(id)
        .execute(pool)
        .await?;

        self.find(pool, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{file_pool, test_pool};
    use crate::repositories::fixtures;
    use chrono::Duration;

    #[actix_rt::test]
    async fn test_create_defaults_and_names() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;

        let record = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        assert_eq!(record.status, ProductionStatus::Producing);
        assert!(record.end_time.is_none());

        let named = ProductionRepository.get_with_names(&pool, &record.id).await.unwrap();
        assert_eq!(named.employee_name.as_deref(), Some(employee.name.as_str()));
        assert_eq!(named.product_name.as_deref(), Some(product.name.as_str()));
        assert_eq!(named.record, record);
    }

    #[actix_rt::test]
    async fn test_create_finished_sets_end_time() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;

        let mut request = fixtures::production_request(&employee.id, &product.id);
        request.status = Some("finalizado".to_string());
        request.start_time = Some(Utc::now() - Duration::hours(2));

        let record = ProductionRepository.create(&pool, request).await.unwrap();
        assert_eq!(record.status, ProductionStatus::Finished);
        assert!(record.end_time.is_some());
    }

    #[actix_rt::test]
    async fn test_create_rejects_missing_references() {
        let pool = test_pool().await;
        let (employee, _) = fixtures::seed(&pool).await;

        let err = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, "no-such-product"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(msg) if msg.contains("Product")));

        let err = ProductionRepository
            .create(&pool, fixtures::production_request("ghost", "no-such-product"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(msg) if msg.contains("Employee")));
    }

    #[actix_rt::test]
    async fn test_update_rejects_end_before_start() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let record = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();

        let update = UpdateProductionRequest {
            employee_id: None,
            product_id: None,
            order_number: None,
            batch_number: None,
            start_time: None,
            end_time: Some(record.start_time - Duration::hours(1)),
            quantity: None,
            observations: None,
        };
        let err = ProductionRepository.update(&pool, &record.id, update).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[actix_rt::test]
    async fn test_status_lifecycle_persists() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let record = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        let repo = ProductionRepository;

        let (_, change) = repo
            .change_status(&pool, &record.id, ProductionStatus::Stopped, None)
            .await
            .unwrap();
        assert!(matches!(change, StatusChange::Changed { .. }));

        let (same, change) = repo
            .change_status(&pool, &record.id, ProductionStatus::Stopped, None)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::Unchanged);
        assert_eq!(same, repo.find(&pool, &record.id).await.unwrap());

        let (finished, _) = repo
            .change_status(&pool, &record.id, ProductionStatus::Finished, None)
            .await
            .unwrap();
        let stored = repo.find(&pool, &record.id).await.unwrap();
        assert_eq!(stored.status, ProductionStatus::Finished);
        assert_eq!(stored.end_time, finished.end_time);
        assert!(stored.end_time.is_some());

        let err = repo
            .change_status(&pool, &record.id, ProductionStatus::Producing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(repo.find(&pool, &record.id).await.unwrap(), stored);
    }

    #[actix_rt::test]
    async fn test_concurrent_status_changes_keep_the_winner() {
        let (_dir, pool) = file_pool(4).await;
        let (employee, product) = fixtures::seed(&pool).await;
        let repo = ProductionRepository;

        for _ in 0..20 {
            let record = repo
                .create(&pool, fixtures::production_request(&employee.id, &product.id))
                .await
                .unwrap();
            repo.change_status(&pool, &record.id, ProductionStatus::Stopped, None)
                .await
                .unwrap();

            let (finish, resume) = futures::join!(
                repo.change_status(&pool, &record.id, ProductionStatus::Finished, None),
                repo.change_status(&pool, &record.id, ProductionStatus::Producing, None),
            );
            let stored = repo.find(&pool, &record.id).await.unwrap();

            match (finish, resume) {
                // Resume landed first and finish then moved on from producing
                (Ok(_), Ok(_)) => assert_eq!(stored.status, ProductionStatus::Finished),
                (Ok((finished, _)), Err(e)) => {
                    assert!(matches!(e, ApiError::Conflict(_)), "{:?}", e);
                    assert_eq!(stored, finished);
                }
                (Err(e), Ok((resumed, _))) => {
                    assert!(matches!(e, ApiError::Conflict(_)), "{:?}", e);
                    assert_eq!(stored, resumed);
                }
                (Err(a), Err(b)) => panic!("both status changes failed: {:?} / {:?}", a, b),
            }
            assert_eq!(stored.end_time.is_some(), stored.status == ProductionStatus::Finished);
        }
    }

    #[actix_rt::test]
    async fn test_update_keeps_end_time_set_by_finish() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let repo = ProductionRepository;
        let record = repo
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        let (finished, _) = repo
            .change_status(&pool, &record.id, ProductionStatus::Finished, None)
            .await
            .unwrap();

        let update = UpdateProductionRequest {
            employee_id: None,
            product_id: None,
            order_number: None,
            batch_number: None,
            start_time: None,
            end_time: None,
            quantity: Some(250),
            observations: None,
        };
        let updated = repo.update(&pool, &record.id, update).await.unwrap();
        assert_eq!(updated.quantity, 250);
        assert_eq!(updated.status, ProductionStatus::Finished);
        assert_eq!(updated.end_time, finished.end_time);
    }

    #[actix_rt::test]
    async fn test_list_filters_by_status_and_search() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let repo = ProductionRepository;

        for order in ["O3001", "O3002", "O3003"] {
            let mut request = fixtures::production_request(&employee.id, &product.id);
            request.order_number = order.to_string();
            repo.create(&pool, request).await.unwrap();
        }
        let mut finished = fixtures::production_request(&employee.id, &product.id);
        finished.order_number = "O4000".to_string();
        finished.status = Some("finished".to_string());
        repo.create(&pool, finished).await.unwrap();

        let query = PaginationQuery { status: Some("producing".to_string()), ..Default::default() };
        assert_eq!(repo.list_with_names(&pool, &query).await.unwrap().total, 3);

        let query = PaginationQuery { search: Some("O4000".to_string()), ..Default::default() };
        let page = repo.list_with_names(&pool, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].record.status, ProductionStatus::Finished);

        // Employee names are searchable too
        let query = PaginationQuery { search: Some(employee.name.clone()), ..Default::default() };
        assert_eq!(repo.list_with_names(&pool, &query).await.unwrap().total, 4);
    }

    #[actix_rt::test]
    async fn test_delete_cascades_hourly_records() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let record = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        fixtures::hourly(&pool, &record.id, &employee.id, "producing", 10).await;
        fixtures::hourly(&pool, &record.id, &employee.id, "stopped", 12).await;
        assert_eq!(ProductionRepository.hourly_count(&pool, &record.id).await.unwrap(), 2);

        ProductionRepository.delete(&pool, &record.id).await.unwrap();

        assert_eq!(ProductionRepository.hourly_count(&pool, &record.id).await.unwrap(), 0);
        assert!(ProductionRepository.get_by_id(&pool, &record.id).await.unwrap().is_none());
    }
}
