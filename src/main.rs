// src/main.rs
use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer,
};
use actix_web::http::header;
use actix_cors::Cors;
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audit;
mod config;
mod dashboard_handlers;
mod db;
mod employee_handlers;
mod error;
mod export;
mod handlers;
mod hourly_record_handlers;
mod models;
mod monitoring;
mod product_handlers;
mod production_handlers;
mod raw_material_handlers;
pub mod repositories;
mod stats;
pub mod validation;

use config::{load_config, Config};
use error::ApiError;
use monitoring::{Metrics, RequestLogger};

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
}

/// Routes under `/api/v1`. Fixed segments such as `/export` are registered
/// before `/{id}` so they are not captured as ids.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/employees")
                    .route("", web::get().to(employee_handlers::get_employees))
                    .route("", web::post().to(employee_handlers::create_employee))
                    .route("/export", web::get().to(export::export_employees))
                    .route("/{id}", web::get().to(employee_handlers::get_employee))
                    .route("/{id}", web::put().to(employee_handlers::update_employee))
                    .route("/{id}", web::delete().to(employee_handlers::delete_employee))
                    .route("/{id}/toggle-active", web::post().to(employee_handlers::toggle_employee_active))
            )
            .service(
                web::scope("/products")
                    .route("", web::get().to(product_handlers::get_products))
                    .route("", web::post().to(product_handlers::create_product))
                    .route("/low-stock", web::get().to(product_handlers::get_low_stock_products))
                    .route("/export", web::get().to(export::export_products))
                    .route("/{id}", web::get().to(product_handlers::get_product))
                    .route("/{id}", web::put().to(product_handlers::update_product))
                    .route("/{id}", web::delete().to(product_handlers::delete_product))
            )
            .service(
                web::scope("/productions")
                    .route("", web::get().to(production_handlers::get_productions))
                    .route("", web::post().to(production_handlers::create_production))
                    .route("/export", web::get().to(export::export_productions))
                    .route("/{id}", web::get().to(production_handlers::get_production))
                    .route("/{id}", web::put().to(production_handlers::update_production))
                    .route("/{id}", web::delete().to(production_handlers::delete_production))
                    .route("/{id}/status", web::put().to(production_handlers::update_production_status))
                    .route("/{id}/hourly", web::get().to(production_handlers::get_production_hourly_records))
                    .route("/{id}/hourly", web::post().to(production_handlers::create_hourly_record))
            )
            .service(
                web::scope("/raw-materials")
                    .route("", web::get().to(raw_material_handlers::get_raw_materials))
                    .route("", web::post().to(raw_material_handlers::create_raw_material))
                    .route("/export", web::get().to(export::export_raw_materials))
                    .route("/{id}", web::get().to(raw_material_handlers::get_raw_material))
                    .route("/{id}", web::put().to(raw_material_handlers::update_raw_material))
                    .route("/{id}", web::delete().to(raw_material_handlers::delete_raw_material))
            )
            .service(
                web::scope("/hourly-records")
                    .route("", web::get().to(hourly_record_handlers::get_hourly_records))
                    .route("/{id}", web::get().to(hourly_record_handlers::get_hourly_record))
                    .route("/{id}", web::put().to(hourly_record_handlers::update_hourly_record))
                    .route("/{id}", web::delete().to(hourly_record_handlers::delete_hourly_record))
            )
            .service(
                web::scope("/dashboard")
                    .route("/overview", web::get().to(dashboard_handlers::get_overview))
                    .route("/production", web::get().to(dashboard_handlers::get_production_dashboard))
                    .route("/inventory", web::get().to(dashboard_handlers::get_inventory_dashboard))
                    .route("/employees", web::get().to(dashboard_handlers::get_employee_dashboard))
            )
            .route("/activity", web::get().to(handlers::get_recent_activity)),
    );
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    if config.is_production() {
        validate_production_config(&config)?;
    }

    let pool = create_database_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let app_state = Arc::new(AppState {
        db_pool: pool.clone(),
        config: config.clone(),
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let metrics = Arc::new(Metrics::new());
    let server_config = config.server.clone();
    let is_production = config.is_production();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&config.security.allowed_origins, is_production);
        let security_headers = setup_security_headers(&config.security);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .app_data(json_config(config.security.max_request_size))
            .app_data(query_config())
            .configure(monitoring::configure_health)
            .configure(configure_api)
    })
        .keep_alive(Duration::from_secs(server_config.keep_alive))
        .client_request_timeout(Duration::from_secs(server_config.client_timeout))
        .client_disconnect_timeout(Duration::from_secs(server_config.client_shutdown));

    if let Some(workers) = server_config.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await
        .context("Server failed to run")?;

    pool.close().await;
    log::info!("Server stopped");
    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid JSON body: {}", err)).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid query string: {}", err)).into())
}

pub fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::USER_AGENT,
            header::REFERER,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH, header::CONTENT_DISPOSITION])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("⚠️  Using wildcard CORS (*) in development mode");
        return cors.allow_any_origin();
    }

    for origin in allowed_origins.iter().filter(|o| !o.is_empty() && o.as_str() != "*") {
        log::debug!("Adding CORS origin: {}", origin);
        cors = cors.allowed_origin(origin);
    }
    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

fn validate_production_config(config: &Config) -> anyhow::Result<()> {
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }

    if config.database.url.contains(":memory:") {
        anyhow::bail!("In-memory database is not allowed in production!");
    }

    Ok(())
}

async fn create_database_pool(db_config: &config::DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database url: {}", db_config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .idle_timeout(Duration::from_secs(db_config.idle_timeout))
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to {}", db_config.url))?;

    Ok(pool)
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload"
        ));
    }

    headers
}
