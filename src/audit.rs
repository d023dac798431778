// src/audit.rs - Activity log for every mutation

use sqlx::SqlitePool;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use actix_web::HttpRequest;
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub description: Option<String>,
    pub changes: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Field-level diff collected before a write.
#[derive(Debug, Default, Serialize)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

#[derive(Debug, Serialize)]
struct FieldChange {
    field: String,
    old: Option<String>,
    new: Option<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Display + PartialEq>(&mut self, field: &str, old: &T, new: &T) {
        if old != new {
            self.changes.push(FieldChange {
                field: field.to_string(),
                old: Some(old.to_string()),
                new: Some(new.to_string()),
            });
        }
    }

    pub fn add_opt<T: Display + PartialEq>(&mut self, field: &str, old: &Option<T>, new: &Option<T>) {
        if old != new {
            self.changes.push(FieldChange {
                field: field.to_string(),
                old: old.as_ref().map(|v| v.to_string()),
                new: new.as_ref().map(|v| v.to_string()),
            });
        }
    }

    pub fn created(&mut self, field: &str, value: &str) {
        self.changes.push(FieldChange {
            field: field.to_string(),
            old: None,
            new: Some(value.to_string()),
        });
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn to_description(&self) -> String {
        self.changes
            .iter()
            .map(|c| match (&c.old, &c.new) {
                (Some(old), Some(new)) => format!("{}: '{}' → '{}'", c.field, old, new),
                (None, Some(new)) => format!("{}: '{}'", c.field, new),
                (Some(old), None) => format!("{}: '{}' → ∅", c.field, old),
                (None, None) => c.field.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_json(&self) -> Option<String> {
        if self.has_changes() {
            serde_json::to_string(&self.changes).ok()
        } else {
            None
        }
    }
}

/// Write an event to audit_logs
pub async fn log_activity(
    pool: &SqlitePool,
    action: &str,
    entity_type: &str,
    entity_id: Option<&str>,
    description: Option<&str>,
    changes: Option<&str>,
    request: Option<&HttpRequest>,
) -> Result<(), sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let ip_address = request.and_then(|req| {
        req.connection_info()
            .realip_remote_addr()
            .map(|s| s.to_string())
    });

    let user_agent = request.and_then(|req| {
        req.headers()
            .get("User-Agent")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    });

    sqlx::query(
        r#"INSERT INTO audit_logs
           (id, action, entity_type, entity_id, description, changes, ip_address, user_agent, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(description)
    .bind(changes)
    .bind(&ip_address)
    .bind(&user_agent)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Short form for handlers; a failed audit write never fails the request.
pub async fn audit(
    pool: &SqlitePool,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    description: &str,
    changes: Option<&ChangeSet>,
    request: &HttpRequest,
) {
    let changes_json = changes.and_then(ChangeSet::to_json);
    if let Err(e) = log_activity(
        pool,
        action,
        entity_type,
        Some(entity_id),
        Some(description),
        changes_json.as_deref(),
        Some(request),
    ).await {
        log::error!("Failed to write audit log: {}", e);
    }
}

pub async fn recent_activity(
    pool: &SqlitePool,
    entity_type: Option<&str>,
    limit: i64,
) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT id, action, entity_type, entity_id, description, changes, ip_address, created_at
           FROM audit_logs
           WHERE (?1 IS NULL OR entity_type = ?1)
           ORDER BY created_at DESC
           LIMIT ?2"#
    )
    .bind(entity_type)
    .bind(limit)
    .fetch_all(pool)
    .await
}
