// src/repositories/hourly_record.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{CrudRepository, EmployeeRepository, ProductionRepository, WhereClause};
use crate::error::{ApiError, ApiResult};
use crate::handlers::PaginationQuery;
use crate::models::*;
use crate::validation::BusinessValidator;

pub struct HourlyRecordRepository;

/// A reading to be attached to a production run.
pub struct NewHourlyRecord {
    pub production_id: String,
    pub data: CreateHourlyRecordRequest,
}

impl HourlyRecordRepository {
    pub async fn latest_for(
        &self,
        pool: &SqlitePool,
        production_id: &str,
    ) -> ApiResult<Option<HourlyRecord>> {
        let latest = sqlx::query_as::<_, HourlyRecord>(
            r#"SELECT * FROM hourly_records
               WHERE production_id = ?
               ORDER BY julianday(timestamp) DESC, julianday(created_at) DESC
               LIMIT 1"#,
        )
        .bind(production_id)
        .fetch_optional(pool)
        .await?;
        Ok(latest)
    }

    /// Readings of one production, oldest first.
    pub async fn list_for_production(
        &self,
        pool: &SqlitePool,
        production_id: &str,
    ) -> ApiResult<Vec<HourlyRecord>> {
        if !ProductionRepository.exists(pool, production_id).await? {
            return Err(ApiError::production_not_found(production_id));
        }

        let records = sqlx::query_as::<_, HourlyRecord>(
            "SELECT * FROM hourly_records WHERE production_id = ? ORDER BY julianday(timestamp) ASC",
        )
        .bind(production_id)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }
}

#[async_trait]
impl CrudRepository<HourlyRecord, NewHourlyRecord, UpdateHourlyRecordRequest>
    for HourlyRecordRepository
{
    fn table_name(&self) -> &'static str {
        "hourly_records"
    }

    fn entity_name(&self) -> &'static str {
        "Hourly record"
    }

    fn search_fields(&self) -> Vec<&'static str> {
        vec!["notes"]
    }

    fn default_sort_field(&self) -> &'static str {
        "timestamp"
    }

    fn apply_filters(&self, query: &PaginationQuery, filter: &mut WhereClause) {
        if let Some(status) = query.status.as_deref().and_then(ProductionStatus::from_str) {
            filter.add_exact("status", status.as_str());
        }
        if let Some(ref production_id) = query.production_id {
            filter.add_exact("production_id", production_id.as_str());
        }
        if let Some(ref operator_id) = query.employee_id {
            filter.add_exact("operator_id", operator_id.as_str());
        }
        filter.add_time_range("timestamp", query.date_from, query.date_to);
    }

    fn not_found(&self, id: &str) -> ApiError {
        ApiError::hourly_record_not_found(id)
    }

    async fn create(&self, pool: &SqlitePool, new: NewHourlyRecord) -> ApiResult<HourlyRecord> {
        let NewHourlyRecord { production_id, data } = new;

        if !ProductionRepository.exists(pool, &production_id).await? {
            return Err(ApiError::production_not_found(&production_id));
        }
        if !EmployeeRepository.exists(pool, &data.operator_id).await? {
            return Err(ApiError::employee_not_found(&data.operator_id));
        }

        let now = Utc::now();
        let status = data.parsed_status();
        let timestamp = data.timestamp.unwrap_or(now);

        let latest = self.latest_for(pool, &production_id).await?;
        BusinessValidator::validate_snapshot(latest.as_ref(), status, timestamp, data.quantity_produced)?
            .into_result("hourly record")?;

        let record = HourlyRecord {
            id: Uuid::new_v4().to_string(),
            production_id,
            timestamp,
            status,
            notes: data.notes,
            quantity_produced: data.quantity_produced,
            temperature: data.temperature,
            pressure: data.pressure,
            operator_id: data.operator_id,
            created_at: now,
        };

        // Inserts only while the reading validated above is still the latest
        // one, so two concurrent readings cannot both pass the check.
        let result = sqlx::query(
            r#"INSERT INTO hourly_records
               (id, production_id, timestamp, status, notes, quantity_produced,
                temperature, pressure, operator_id, created_at)
               SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
               WHERE (SELECT id FROM hourly_records
                      WHERE production_id = ?
                      ORDER BY julianday(timestamp) DESC, julianday(created_at) DESC
                      LIMIT 1) IS ?"#,
        )
        .bind(&record.id)
        .bind(&record.production_id)
        .bind(record.timestamp)
        .bind(record.status)
        .bind(&record.notes)
        .bind(record.quantity_produced)
        .bind(record.temperature)
        .bind(record.pressure)
        .bind(&record.operator_id)
        .bind(record.created_at)
        .bind(&record.production_id)
        .bind(latest.as_ref().map(|r| r.id.as_str()))
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            log::warn!(
                "Hourly reading for production {} rejected: latest reading changed concurrently",
                record.production_id
            );
            return Err(ApiError::Conflict(format!(
                "Production {} received another reading concurrently, retry the request",
                record.production_id
            )));
        }

        Ok(record)
    }

    /// Manual correction of a reading. Status is taken as given.
    async fn update(
        &self,
        pool: &SqlitePool,
        id: &str,
        data: UpdateHourlyRecordRequest,
    ) -> ApiResult<HourlyRecord> {
        let mut record = self.find(pool, id).await?;

        if let Some(operator_id) = data.operator_id {
            if operator_id != record.operator_id
                && !EmployeeRepository.exists(pool, &operator_id).await?
            {
                return Err(ApiError::employee_not_found(&operator_id));
            }
            record.operator_id = operator_id;
        }
        if let Some(timestamp) = data.timestamp {
            record.timestamp = timestamp;
        }
        if let Some(raw) = data.status.as_deref() {
            record.status = ProductionStatus::from_str(raw).ok_or_else(|| {
                ApiError::ValidationError(format!("Unknown production status '{}'", raw))
            })?;
        }
        if data.notes.is_some() {
            record.notes = data.notes;
        }
        if let Some(quantity) = data.quantity_produced {
            record.quantity_produced = quantity;
        }
        if data.temperature.is_some() {
            record.temperature = data.temperature;
        }
        if data.pressure.is_some() {
            record.pressure = data.pressure;
        }

        sqlx::query(
            r#"UPDATE hourly_records SET
               timestamp = ?, status = ?, notes = ?, quantity_produced = ?,
               temperature = ?, pressure = ?, operator_id = ?
               WHERE id = ?"#,
        )
        .bind(record.timestamp)
        .bind(record.status)
        .bind(&record.notes)
        .bind(record.quantity_produced)
        .bind(record.temperature)
        .bind(record.pressure)
        .bind(&record.operator_id)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{file_pool, test_pool};
    use crate::repositories::fixtures;
    use chrono::Duration;

    fn reading(operator_id: &str, status: &str, quantity: i64) -> CreateHourlyRecordRequest {
        CreateHourlyRecordRequest {
            timestamp: None,
            status: status.to_string(),
            notes: None,
            quantity_produced: quantity,
            temperature: Some(28.0),
            pressure: Some(1.2),
            operator_id: operator_id.to_string(),
        }
    }

    #[actix_rt::test]
    async fn test_snapshot_sequence() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let production = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        let repo = HourlyRecordRepository;
        let base = Utc::now() - Duration::hours(5);

        for (offset, status) in [(0, "producing"), (1, "separating"), (2, "finished")] {
            let mut data = reading(&employee.id, status, 10 * (offset + 1));
            data.timestamp = Some(base + Duration::hours(offset));
            repo.create(&pool, NewHourlyRecord { production_id: production.id.clone(), data })
                .await
                .unwrap();
        }

        let latest = repo.latest_for(&pool, &production.id).await.unwrap().unwrap();
        assert_eq!(latest.status, ProductionStatus::Finished);

        let mut data = reading(&employee.id, "producing", 40);
        data.timestamp = Some(base + Duration::hours(3));
        let err = repo
            .create(&pool, NewHourlyRecord { production_id: production.id.clone(), data })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let listed = repo.list_for_production(&pool, &production.id).await.unwrap();
        let statuses: Vec<_> = listed.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ProductionStatus::Producing, ProductionStatus::Separating, ProductionStatus::Finished]
        );
    }

    #[actix_rt::test]
    async fn test_unknown_production_or_operator() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let repo = HourlyRecordRepository;

        let err = repo
            .create(&pool, NewHourlyRecord {
                production_id: "missing".to_string(),
                data: reading(&employee.id, "producing", 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let production = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        let err = repo
            .create(&pool, NewHourlyRecord {
                production_id: production.id,
                data: reading("nobody", "producing", 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(msg) if msg.contains("Employee")));

        assert!(repo.list_for_production(&pool, "missing").await.is_err());
    }

    #[actix_rt::test]
    async fn test_concurrent_readings_each_follow_the_latest() {
        let (_dir, pool) = file_pool(4).await;
        let (employee, product) = fixtures::seed(&pool).await;
        let repo = HourlyRecordRepository;
        let base = Utc::now() - Duration::hours(10);

        for _ in 0..20 {
            let production = ProductionRepository
                .create(&pool, fixtures::production_request(&employee.id, &product.id))
                .await
                .unwrap();
            let at = |hours: i64, status: &str| {
                let mut data = reading(&employee.id, status, 10);
                data.timestamp = Some(base + Duration::hours(hours));
                NewHourlyRecord { production_id: production.id.clone(), data }
            };
            repo.create(&pool, at(0, "stopped")).await.unwrap();

            let (finish, resume) = futures::join!(
                repo.create(&pool, at(1, "finished")),
                repo.create(&pool, at(2, "producing")),
            );
            assert!(finish.is_ok() || resume.is_ok());
            for err in [finish.err(), resume.err()].into_iter().flatten() {
                assert!(matches!(err, ApiError::Conflict(_)), "{:?}", err);
            }

            // Replayed in insertion order, every reading must be reachable
            // from the reading that was latest when it was written.
            let inserted = sqlx::query_as::<_, HourlyRecord>(
                "SELECT * FROM hourly_records WHERE production_id = ? ORDER BY rowid",
            )
            .bind(&production.id)
            .fetch_all(&pool)
            .await
            .unwrap();
            for i in 1..inserted.len() {
                let previous = inserted[..i]
                    .iter()
                    .max_by_key(|r| (r.timestamp, r.created_at))
                    .unwrap();
                assert!(
                    previous.status.can_transition_to(inserted[i].status),
                    "{} written after {}",
                    inserted[i].status,
                    previous.status
                );
            }
        }
    }

    #[actix_rt::test]
    async fn test_update_rejects_unknown_status() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let production = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        let created = fixtures::hourly(&pool, &production.id, &employee.id, "producing", 10).await;

        let update = UpdateHourlyRecordRequest {
            timestamp: None,
            status: Some("paused".to_string()),
            notes: None,
            quantity_produced: Some(12),
            temperature: None,
            pressure: None,
            operator_id: None,
        };
        let err = HourlyRecordRepository.update(&pool, &created.id, update).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(msg) if msg.contains("paused")));
        assert_eq!(HourlyRecordRepository.find(&pool, &created.id).await.unwrap(), created);
    }

    #[actix_rt::test]
    async fn test_update_corrects_reading() {
        let pool = test_pool().await;
        let (employee, product) = fixtures::seed(&pool).await;
        let production = ProductionRepository
            .create(&pool, fixtures::production_request(&employee.id, &product.id))
            .await
            .unwrap();
        let created = fixtures::hourly(&pool, &production.id, &employee.id, "producing", 10).await;

        let update = UpdateHourlyRecordRequest {
            timestamp: None,
            status: Some("stopped".to_string()),
            notes: Some("Nozzle cleaned".to_string()),
            quantity_produced: Some(8),
            temperature: None,
            pressure: None,
            operator_id: None,
        };
        let updated = HourlyRecordRepository.update(&pool, &created.id, update).await.unwrap();
        assert_eq!(updated.status, ProductionStatus::Stopped);
        assert_eq!(updated.quantity_produced, 8);
        assert_eq!(updated.temperature, created.temperature);
        assert_eq!(HourlyRecordRepository.find(&pool, &created.id).await.unwrap(), updated);
    }
}
