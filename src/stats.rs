// src/stats.rs - Dashboard aggregates computed from fresh reads
//! Every function here is pure: callers load the rows, these fold them.

use std::collections::{BTreeMap, HashMap};
use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::config::InventoryConfig;
use crate::models::*;

pub const TOP_PRODUCERS: usize = 5;
pub const PRODUCTION_DAYS: i64 = 7;
pub const READING_HOURS: i64 = 24;
pub const UNTYPED: &str = "untyped";

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Sum of `value` over the items accepted by `predicate`.
pub fn sum_where<T, P, V>(items: &[T], predicate: P, value: V) -> f64
where
    P: Fn(&T) -> bool,
    V: Fn(&T) -> f64,
{
    items.iter().filter(|item| predicate(item)).map(value).sum()
}

// ==================== EXPIRATION ====================

pub fn days_until(expiration: NaiveDate, today: NaiveDate) -> i64 {
    (expiration - today).num_days()
}

pub fn expiration_status(expiration: NaiveDate, today: NaiveDate, window_days: i64) -> ExpirationStatus {
    let days = days_until(expiration, today);
    if days < 0 {
        ExpirationStatus::Expired
    } else if days < window_days {
        ExpirationStatus::Expiring
    } else {
        ExpirationStatus::Valid
    }
}

pub fn material_view(material: RawMaterial, today: NaiveDate, config: &InventoryConfig) -> RawMaterialView {
    let days = days_until(material.expiration_date, today);
    let status = expiration_status(material.expiration_date, today, config.expiring_window_days);
    let low_stock = material.quantity < config.low_stock_kg;
    RawMaterialView {
        material,
        expiration_status: status,
        days_until_expiration: days,
        low_stock,
    }
}

#[derive(Debug, Default, Serialize, Clone, PartialEq)]
pub struct ExpirationSummary {
    pub expired: i64,
    pub expiring: i64,
    pub valid: i64,
}

pub fn expiration_summary(materials: &[RawMaterial], today: NaiveDate, window_days: i64) -> ExpirationSummary {
    let mut summary = ExpirationSummary::default();
    for material in materials {
        match expiration_status(material.expiration_date, today, window_days) {
            ExpirationStatus::Expired => summary.expired += 1,
            ExpirationStatus::Expiring => summary.expiring += 1,
            ExpirationStatus::Valid => summary.valid += 1,
        }
    }
    summary
}

// ==================== INVENTORY ====================

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProductInventory {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub total_stock: i64,
    pub low_stock: i64,
}

pub fn product_inventory(products: &[Product], low_stock_units: i64) -> ProductInventory {
    let active = products.iter().filter(|p| p.active).count() as i64;
    ProductInventory {
        total: products.len() as i64,
        active,
        inactive: products.len() as i64 - active,
        total_stock: products.iter().map(|p| p.stock).sum(),
        low_stock: products.iter().filter(|p| p.stock < low_stock_units).count() as i64,
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MaterialInventory {
    pub total: i64,
    pub total_kg: f64,
    pub low_stock: i64,
    pub expiration: ExpirationSummary,
}

pub fn material_inventory(materials: &[RawMaterial], today: NaiveDate, config: &InventoryConfig) -> MaterialInventory {
    MaterialInventory {
        total: materials.len() as i64,
        total_kg: round_to(materials.iter().map(|m| m.quantity).sum(), 3),
        low_stock: materials.iter().filter(|m| m.quantity < config.low_stock_kg).count() as i64,
        expiration: expiration_summary(materials, today, config.expiring_window_days),
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TypeStock {
    pub product_type: String,
    pub label: String,
    pub products: i64,
    pub stock: i64,
}

/// Stock grouped by product type, catalogue order, untyped last.
pub fn stock_by_type(products: &[Product]) -> Vec<TypeStock> {
    let mut groups: HashMap<Option<ProductType>, (i64, i64)> = HashMap::new();
    for product in products {
        let entry = groups.entry(product.parsed_type()).or_default();
        entry.0 += 1;
        entry.1 += product.stock;
    }

    let mut result: Vec<TypeStock> = ProductType::iter()
        .filter_map(|t| {
            groups.get(&Some(t)).map(|(count, stock)| TypeStock {
                product_type: t.as_str().to_string(),
                label: t.label().to_string(),
                products: *count,
                stock: *stock,
            })
        })
        .collect();

    if let Some((count, stock)) = groups.get(&None) {
        result.push(TypeStock {
            product_type: UNTYPED.to_string(),
            label: "Sem tipo".to_string(),
            products: *count,
            stock: *stock,
        });
    }
    result
}

// ==================== PRODUCTION ====================

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StatusCount {
    pub status: ProductionStatus,
    pub label: &'static str,
    pub count: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProductionStats {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub by_status: Vec<StatusCount>,
    pub total_quantity: i64,
    /// Mean run length over records that have an end time.
    pub average_duration_hours: f64,
}

pub fn production_stats(records: &[ProductionRecord]) -> ProductionStats {
    let by_status = ProductionStatus::iter()
        .map(|status| StatusCount {
            status,
            label: status.display_name(),
            count: records.iter().filter(|r| r.status == status).count() as i64,
        })
        .collect();

    let durations: Vec<f64> = records.iter().filter_map(ProductionRecord::duration_hours).collect();
    let average = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    ProductionStats {
        total: records.len() as i64,
        active: records.iter().filter(|r| r.status.is_active()).count() as i64,
        completed: records.iter().filter(|r| r.status.is_terminal()).count() as i64,
        by_status,
        total_quantity: records.iter().map(|r| r.quantity).sum(),
        average_duration_hours: round_to(average, 1),
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DailyQuantity {
    pub date: NaiveDate,
    pub quantity: i64,
}

/// Hourly output summed per UTC day, `days` entries ending today, oldest first.
pub fn production_by_day(records: &[HourlyRecord], today: NaiveDate, days: i64) -> Vec<DailyQuantity> {
    let first = today - Duration::days(days - 1);
    let mut totals: BTreeMap<NaiveDate, i64> = (0..days)
        .map(|offset| (first + Duration::days(offset), 0))
        .collect();

    for record in records {
        if let Some(total) = totals.get_mut(&record.timestamp.date_naive()) {
            *total += record.quantity_produced;
        }
    }

    totals
        .into_iter()
        .map(|(date, quantity)| DailyQuantity { date, quantity })
        .collect()
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct HourlyConditions {
    pub hour: DateTime<Utc>,
    pub samples: i64,
    pub avg_temperature: Option<f64>,
    pub avg_pressure: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Temperature and pressure averaged per hour over the last `hours` hours.
/// Hours without any reading are left out.
pub fn conditions_by_hour(records: &[HourlyRecord], now: DateTime<Utc>, hours: i64) -> Vec<HourlyConditions> {
    let current_hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    let first_hour = current_hour - Duration::hours(hours - 1);
    let end = current_hour + Duration::hours(1);

    let mut buckets: BTreeMap<DateTime<Utc>, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for record in records {
        if record.timestamp < first_hour || record.timestamp >= end {
            continue;
        }
        let hour = record
            .timestamp
            .duration_trunc(Duration::hours(1))
            .unwrap_or(record.timestamp);
        let bucket = buckets.entry(hour).or_default();
        if let Some(t) = record.temperature {
            bucket.0.push(t);
        }
        if let Some(p) = record.pressure {
            bucket.1.push(p);
        }
    }

    buckets
        .into_iter()
        .filter_map(|(hour, (temps, pressures))| {
            let avg_temperature = mean(&temps).map(|t| round_to(t, 1));
            let avg_pressure = mean(&pressures).map(|p| round_to(p, 2));
            if avg_temperature.is_none() && avg_pressure.is_none() {
                return None;
            }
            Some(HourlyConditions {
                hour,
                samples: temps.len().max(pressures.len()) as i64,
                avg_temperature,
                avg_pressure,
            })
        })
        .collect()
}

// ==================== EMPLOYEES ====================

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EmployeeCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

pub fn employee_counts(employees: &[Employee]) -> EmployeeCounts {
    let active = employees.iter().filter(|e| e.active).count() as i64;
    EmployeeCounts {
        total: employees.len() as i64,
        active,
        inactive: employees.len() as i64 - active,
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EmployeeProduction {
    pub employee_id: String,
    pub name: String,
    pub role: String,
    pub total_productions: i64,
    pub completed_productions: i64,
    pub active_productions: i64,
    pub total_quantity: i64,
}

/// One row per employee, including those without productions.
pub fn employee_production(employees: &[Employee], records: &[ProductionRecord]) -> Vec<EmployeeProduction> {
    let mut by_employee: HashMap<&str, Vec<&ProductionRecord>> = HashMap::new();
    for record in records {
        by_employee.entry(record.employee_id.as_str()).or_default().push(record);
    }

    employees
        .iter()
        .map(|employee| {
            let own = by_employee.get(employee.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            EmployeeProduction {
                employee_id: employee.id.clone(),
                name: employee.name.clone(),
                role: employee.role.clone(),
                total_productions: own.len() as i64,
                completed_productions: own.iter().filter(|r| r.status.is_terminal()).count() as i64,
                active_productions: own.iter().filter(|r| r.status.is_active()).count() as i64,
                total_quantity: own.iter().map(|r| r.quantity).sum(),
            }
        })
        .collect()
}

/// Highest production counts first; ties keep name order.
pub fn top_producers(rows: &[EmployeeProduction], limit: usize) -> Vec<EmployeeProduction> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        b.total_productions
            .cmp(&a.total_productions)
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted.truncate(limit);
    sorted
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RoleProduction {
    pub role: String,
    pub employees: i64,
    pub total_productions: i64,
    pub total_quantity: i64,
}

pub fn productions_by_role(rows: &[EmployeeProduction]) -> Vec<RoleProduction> {
    let mut groups: BTreeMap<&str, RoleProduction> = BTreeMap::new();
    for row in rows {
        let group = groups.entry(row.role.as_str()).or_insert_with(|| RoleProduction {
            role: row.role.clone(),
            employees: 0,
            total_productions: 0,
            total_quantity: 0,
        });
        group.employees += 1;
        group.total_productions += row.total_productions;
        group.total_quantity += row.total_quantity;
    }
    groups.into_values().collect()
}
