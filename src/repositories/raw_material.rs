// src/repositories/raw_material.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateRawMaterialRequest, RawMaterial, UpdateRawMaterialRequest};

pub struct RawMaterialRepository;

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
impl CrudRepository<RawMaterial, CreateRawMaterialRequest, UpdateRawMaterialRequest>
    for RawMaterialRepository
{
    fn table_name(&self) -> &'static str {
        "raw_materials"
    }

    fn entity_name(&self) -> &'static str {
        "Raw material"
    }

    fn search_fields(&self) -> Vec<&'static str> {
        vec!["name", "material_type", "batch_number", "supplier", "storage_location"]
    }

    fn default_sort_field(&self) -> &'static str {
        "expiration_date"
    }

    fn default_sort_order(&self) -> &'static str {
        "ASC"
    }

    fn not_found(&self, id: &str) -> ApiError {
        ApiError::raw_material_not_found(id)
    }

    async fn create(
        &self,
        pool: &SqlitePool,
        data: CreateRawMaterialRequest,
    ) -> ApiResult<RawMaterial> {
        let now = Utc::now();
        let material = RawMaterial {
            id: Uuid::new_v4().to_string(),
            name: data.name.trim().to_string(),
            material_type: data.material_type.trim().to_string(),
            quantity: data.quantity,
            batch_number: data.batch_number.trim().to_string(),
            expiration_date: data.expiration_date,
            supplier: trimmed(data.supplier),
            storage_location: trimmed(data.storage_location),
            notes: data.notes,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO raw_materials
               (id, name, material_type, quantity, batch_number, expiration_date,
                supplier, storage_location, notes, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&material.id)
        .bind(&material.name)
        .bind(&material.material_type)
        .bind(material.quantity)
        .bind(&material.batch_number)
        .bind(material.expiration_date)
        .bind(&material.supplier)
        .bind(&material.storage_location)
        .bind(&material.notes)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(pool)
        .await?;

        Ok(material)
    }

    async fn update(
        &self,
        pool: &SqlitePool,
        id: &str,
        data: UpdateRawMaterialRequest,
    ) -> ApiResult<RawMaterial> {
        let mut material = self.find(pool, id).await?;

        if let Some(name) = data.name {
            material.name = name.trim().to_string();
        }
        if let Some(material_type) = data.material_type {
            material.material_type = material_type.trim().to_string();
        }
        if let Some(quantity) = data.quantity {
            material.quantity = quantity;
        }
        if let Some(batch_number) = data.batch_number {
            material.batch_number = batch_number.trim().to_string();
        }
        if let Some(expiration_date) = data.expiration_date {
            material.expiration_date = expiration_date;
        }
        if data.supplier.is_some() {
            material.supplier = trimmed(data.supplier);
        }
        if data.storage_location.is_some() {
            material.storage_location = trimmed(data.storage_location);
        }
        if data.notes.is_some() {
            material.notes = data.notes;
        }
        material.updated_at = Utc::now();

        sqlx::query(
            r#"UPDATE raw_materials SET
               name = ?, material_type = ?, quantity = ?, batch_number = ?, expiration_date = ?,
               supplier = ?, storage_location = ?, notes = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&material.name)
        .bind(&material.material_type)
        .bind(material.quantity)
        .bind(&material.batch_number)
        .bind(material.expiration_date)
        .bind(&material.supplier)
        .bind(&material.storage_location)
        .bind(&material.notes)
        .bind(material.updated_at)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(material)
    }
}
