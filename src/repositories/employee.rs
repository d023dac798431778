// src/repositories/employee.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{CrudRepository, WhereClause};
use crate::error::{ApiError, ApiResult};
use crate::handlers::PaginationQuery;
use crate::models::{CreateEmployeeRequest, Employee, UpdateEmployeeRequest};

pub struct EmployeeRepository;

impl EmployeeRepository {
    async fn ensure_email_free(
        &self,
        pool: &SqlitePool,
        email: &str,
        exclude_id: Option<&str>,
    ) -> ApiResult<()> {
        let taken: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM employees WHERE LOWER(email) = LOWER(?) AND id != COALESCE(?, '')",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;

        if taken.0 > 0 {
            return Err(ApiError::employee_email_taken(email));
        }
        Ok(())
    }

    /// Flips the active flag and returns the updated employee.
    pub async fn toggle_active(&self, pool: &SqlitePool, id: &str) -> ApiResult<Employee> {
        let result = sqlx::query(
            "UPDATE employees SET active = CASE active WHEN 1 THEN 0 ELSE 1 END, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::employee_not_found(id));
        }
        self.find(pool, id).await
    }

    /// Production and hourly rows that still point at the employee.
    pub async fn reference_count(&self, pool: &SqlitePool, id: &str) -> ApiResult<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"SELECT
                (SELECT COUNT(*) FROM production_records WHERE employee_id = ?1) +
                (SELECT COUNT(*) FROM hourly_records WHERE operator_id = ?1)"#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(count.0)
    }
}

fn clean_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

#[async_trait]
impl CrudRepository<Employee, CreateEmployeeRequest, UpdateEmployeeRequest> for EmployeeRepository {
    fn table_name(&self) -> &'static str {
        "employees"
    }

    fn entity_name(&self) -> &'static str {
        "Employee"
    }

    fn search_fields(&self) -> Vec<&'static str> {
        vec!["name", "email", "role"]
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

    async fn create(&self, pool: &SqlitePool, data: CreateEmployeeRequest) -> ApiResult<Employee> {
        let email = clean_email(data.email);
        if let Some(ref email) = email {
            self.ensure_email_free(pool, email, None).await?;
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO employees (id, name, email, role, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(data.name.trim())
        .bind(&email)
        .bind(data.role.trim())
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
        data: UpdateEmployeeRequest,
    ) -> ApiResult<Employee> {
        let existing = self.find(pool, id).await?;

        let email = match data.email {
            Some(email) => clean_email(Some(email)),
            None => existing.email.clone(),
        };
        if let Some(ref email) = email {
            if existing.email.as_deref() != Some(email.as_str()) {
                self.ensure_email_free(pool, email, Some(id)).await?;
            }
        }

        let name = data.name.map(|n| n.trim().to_string()).unwrap_or(existing.name);
        let role = data.role.map(|r| r.trim().to_string()).unwrap_or(existing.role);
        let active = data.active.unwrap_or(existing.active);

        sqlx::query(
            "UPDATE employees SET name = ?, email = ?, role = ?, active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&email)
        .bind(&role)
        .bind(active)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        self.find(pool, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    fn request(name: &str, email: Option<&str>) -> CreateEmployeeRequest {
        CreateEmployeeRequest {
            name: name.to_string(),
            email: email.map(str::to_string),
            role: "Operator".to_string(),
            active: None,
        }
    }

    #[actix_rt::test]
    async fn test_create_and_toggle() {
        let pool = test_pool().await;
        let repo = EmployeeRepository;

        let created = repo.create(&pool, request("  Maria Silva ", Some("maria@factory.local"))).await.unwrap();
        assert_eq!(created.name, "Maria Silva");
        assert!(created.active);

        let toggled = repo.toggle_active(&pool, &created.id).await.unwrap();
        assert!(!toggled.active);
        let toggled = repo.toggle_active(&pool, &created.id).await.unwrap();
        assert!(toggled.active);
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_conflict() {
        let pool = test_pool().await;
        let repo = EmployeeRepository;

        repo.create(&pool, request("Ana", Some("ana@factory.local"))).await.unwrap();
        let err = repo
            .create(&pool, request("Ana Souza", Some("ANA@factory.local")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_paginated_active_filter_and_search() {
        let pool = test_pool().await;
        let repo = EmployeeRepository;

        repo.create(&pool, request("Carlos", None)).await.unwrap();
        let bruna = repo.create(&pool, request("Bruna", None)).await.unwrap();
        repo.create(&pool, request("Alice", None)).await.unwrap();
        repo.toggle_active(&pool, &bruna.id).await.unwrap();

        let all = repo.get_paginated(&pool, &PaginationQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);
        let names: Vec<_> = all.data.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bruna", "Carlos"]);

        let active = PaginationQuery { active: Some(true), ..Default::default() };
        assert_eq!(repo.get_paginated(&pool, &active).await.unwrap().total, 2);

        let search = PaginationQuery { search: Some("car".to_string()), ..Default::default() };
        let found = repo.get_paginated(&pool, &search).await.unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.data[0].name, "Carlos");

        let far = PaginationQuery { page: Some(i64::MAX), ..Default::default() };
        let beyond = repo.get_paginated(&pool, &far).await.unwrap();
        assert_eq!(beyond.total, 3);
        assert!(beyond.data.is_empty());
    }

    #[actix_rt::test]
    async fn test_update_and_delete_missing() {
        let pool = test_pool().await;
        let repo = EmployeeRepository;

        let update = UpdateEmployeeRequest { name: Some("X".into()), email: None, role: None, active: None };
        let err = repo.update(&pool, "missing", update).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = repo.delete(&pool, "missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
