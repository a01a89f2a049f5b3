use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod docs;
mod error;
mod hris;
mod model;
mod models;
mod report;
mod response;
mod routes;
mod services;
#[cfg(test)]
mod test_support;
mod utils;

use crate::cache::{
    DatasetCache, MySqlDatasetSource, RedisReportCache, ReportCache, warmup_dataset_cache,
};
use crate::docs::ApiDoc;
use crate::error::extractor_error;
use crate::hris::HrisClient;
use crate::report::{MySqlReportStore, ReportService, ReportTtl};
use config::Config;
use db::init_db;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[get("/health")]
async fn health() -> impl Responder {
    response::ok(json!({ "status": "ok" }))
}

/// `None` when Redis is down; reports are then served straight from MySQL.
async fn connect_report_cache(url: &str) -> Option<Arc<dyn ReportCache>> {
    match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, RedisReportCache::connect(url)).await {
        Ok(Ok(cache)) => Some(Arc::new(cache)),
        Ok(Err(e)) => {
            warn!(error = %e, "Redis unavailable, continuing without report cache");
            None
        }
        Err(_) => {
            warn!("Redis connection timed out, continuing without report cache");
            None
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(config.database.clone()).await?;
    auth::handlers::seed_default_admin(&pool, &config).await?;

    let report_cache = connect_report_cache(&config.redis_url).await;
    let reports = Data::new(ReportService::new(
        Arc::new(MySqlReportStore::new(pool.clone())),
        report_cache,
        ReportTtl {
            aggregate_secs: config.report_cache_ttl_secs,
            employee_first_page_secs: config.employee_report_cache_ttl_secs,
        },
    ));

    let datasets = Data::new(DatasetCache::new(
        Arc::new(MySqlDatasetSource::new(pool.clone())),
        Duration::from_secs(config.dataset_cache_ttl_secs),
    ));

    let hris = Data::new(HrisClient::from_config(&config).context("building HRIS client")?);

    let warmup = datasets.clone().into_inner();
    actix_web::rt::spawn(async move {
        warmup_dataset_cache(&warmup).await;
    });

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(reports.clone())
            .app_data(datasets.clone())
            .app_data(hris.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _| extractor_error(err)))
            .app_data(web::QueryConfig::default().error_handler(|err, _| extractor_error(err)))
            .service(health)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
