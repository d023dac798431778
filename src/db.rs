// src/db.rs - Database schema setup

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(trim(name)) > 0 AND length(name) <= 255),
            email TEXT UNIQUE CHECK(email IS NULL OR length(email) <= 255),
            role TEXT NOT NULL CHECK(length(trim(role)) > 0 AND length(role) <= 100),
            active INTEGER NOT NULL DEFAULT 1 CHECK(active IN (0, 1)),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(trim(name)) > 0 AND length(name) <= 255),
            code TEXT CHECK(code IS NULL OR length(code) <= 50),
            category TEXT NOT NULL CHECK(length(category) <= 100),
            product_type TEXT CHECK(product_type IS NULL OR product_type IN (
                'builder_gel', 'flex_base_coat', 'structural_base_coat', 'top_coat',
                'shine_top_coat', 'gummy_gel', 'fiber_bath', 'shine_gel'
            )),
            stock INTEGER NOT NULL DEFAULT 0 CHECK(stock >= 0),
            price REAL NOT NULL DEFAULT 0 CHECK(price >= 0),
            batch_number TEXT CHECK(batch_number IS NULL OR length(batch_number) <= 100),
            manufacturing_date DATE,
            order_number TEXT CHECK(order_number IS NULL OR length(order_number) <= 100),
            active INTEGER NOT NULL DEFAULT 1 CHECK(active IN (0, 1)),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_products_name ON products (LOWER(name))")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS production_records (
            id TEXT PRIMARY KEY,
            employee_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            order_number TEXT NOT NULL CHECK(length(order_number) > 0 AND length(order_number) <= 100),
            batch_number TEXT NOT NULL CHECK(length(batch_number) > 0 AND length(batch_number) <= 100),
            status TEXT NOT NULL DEFAULT 'producing' CHECK(
                status IN ('producing', 'separating', 'stopped', 'finished')
            ),
            start_time DATETIME NOT NULL,
            end_time DATETIME,
            quantity INTEGER NOT NULL DEFAULT 0 CHECK(quantity >= 0),
            observations TEXT CHECK(observations IS NULL OR length(observations) <= 1000),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (employee_id) REFERENCES employees (id),
            FOREIGN KEY (product_id) REFERENCES products (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_materials (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(trim(name)) > 0 AND length(name) <= 255),
            material_type TEXT NOT NULL CHECK(length(material_type) <= 100),
            quantity REAL NOT NULL CHECK(quantity >= 0),
            batch_number TEXT NOT NULL CHECK(length(batch_number) > 0 AND length(batch_number) <= 100),
            expiration_date DATE NOT NULL,
            supplier TEXT CHECK(supplier IS NULL OR length(supplier) <= 255),
            storage_location TEXT CHECK(storage_location IS NULL OR length(storage_location) <= 255),
            notes TEXT CHECK(notes IS NULL OR length(notes) <= 1000),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hourly_records (
            id TEXT PRIMARY KEY,
            production_id TEXT NOT NULL,
            timestamp DATETIME NOT NULL,
            status TEXT NOT NULL CHECK(
                status IN ('producing', 'separating', 'stopped', 'finished')
            ),
            notes TEXT CHECK(notes IS NULL OR length(notes) <= 1000),
            quantity_produced INTEGER NOT NULL DEFAULT 0 CHECK(quantity_produced >= 0),
            temperature REAL,
            pressure REAL CHECK(pressure IS NULL OR pressure >= 0),
            operator_id TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (production_id) REFERENCES production_records (id) ON DELETE CASCADE,
            FOREIGN KEY (operator_id) REFERENCES employees (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            description TEXT,
            changes TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_production_employee ON production_records (employee_id)",
        "CREATE INDEX IF NOT EXISTS idx_production_product ON production_records (product_id)",
        "CREATE INDEX IF NOT EXISTS idx_production_status ON production_records (status)",
        "CREATE INDEX IF NOT EXISTS idx_hourly_production ON hourly_records (production_id, timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_raw_materials_expiration ON raw_materials (expiration_date)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs (created_at)",
    ];
    for index in indexes {
        sqlx::query(index).execute(pool).await?;
    }

    log::info!("Database migrations completed");
    Ok(())
}
