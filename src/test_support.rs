//! Shared harness for handler tests: a fully routed app over fake stores.

use crate::{
    auth::jwt::generate_access_token,
    cache::{
        DatasetCache,
        dataset::testing::CountingSource,
        report::{ReportCache, memory::MemoryReportCache},
    },
    config::Config,
    error::extractor_error,
    hris::HrisClient,
    model::role::Role,
    report::{ReportService, ReportTtl, service::testing::FakeReportStore},
    routes,
};
use actix_web::{
    App,
    body::{BoxBody, MessageBody},
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::{StatusCode, header},
    test::{self, TestRequest},
    web::{self, Data},
};
use serde_json::Value;
use sqlx::{Executor, MySqlPool, mysql::MySqlPoolOptions};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub const JWT_SECRET: &str = "test-secret";

pub fn config(hris_base_url: &str) -> Config {
    let env = HashMap::from([
        ("DATABASE_URL", "mysql://nobody@127.0.0.1:1/attendance".to_string()),
        ("JWT_SECRET", JWT_SECRET.to_string()),
        ("HRIS_BASE_URL", hris_base_url.to_string()),
        ("HRIS_USERNAME", "svc".to_string()),
        ("HRIS_PASSWORD", "svc-pass".to_string()),
        ("HRIS_TIMEOUT_SECS", "2".to_string()),
    ]);
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

/// A pool that never connects; handlers reaching MySQL fail fast with a 500.
pub fn unreachable_pool(config: &Config) -> MySqlPool {
    MySqlPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy_with(config.database.clone())
}

pub struct TestApp {
    pub config: Config,
    pub store: Arc<FakeReportStore>,
    pub report_cache: Arc<MemoryReportCache>,
    pub source: Arc<CountingSource>,
    pub datasets: Data<DatasetCache>,
    pub reports: Data<ReportService>,
    pub hris: Data<HrisClient>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::with_hris("http://127.0.0.1:1")
    }
}

impl TestApp {
    pub fn with_hris(base_url: &str) -> Self {
        let config = config(base_url);
        let store = Arc::new(FakeReportStore::default());
        let report_cache = Arc::new(MemoryReportCache::default());
        let source = Arc::new(CountingSource::default());

        let reports = ReportService::new(
            store.clone(),
            Some(report_cache.clone() as Arc<dyn ReportCache>),
            ReportTtl::default(),
        );
        let datasets = DatasetCache::new(source.clone(), Duration::from_secs(1800));
        let hris = HrisClient::from_config(&config).unwrap();

        Self {
            config,
            store,
            report_cache,
            source,
            datasets: Data::new(datasets),
            reports: Data::new(reports),
            hris: Data::new(hris),
        }
    }

    /// Must be called inside the test runtime; the lazy pool spawns its reaper.
    pub fn build(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<BoxBody>,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        self.build_on(unreachable_pool(&self.config))
    }

    /// Same app over a caller-provided pool, for tests against a live MySQL.
    pub fn build_on(
        &self,
        pool: MySqlPool,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<BoxBody>,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        let config = self.config.clone();
        App::new()
            .app_data(Data::new(pool))
            .app_data(Data::new(config.clone()))
            .app_data(self.reports.clone())
            .app_data(self.datasets.clone())
            .app_data(self.hris.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _| extractor_error(err)))
            .app_data(web::QueryConfig::default().error_handler(|err, _| extractor_error(err)))
            .configure(move |cfg| routes::configure(cfg, config.clone()))
    }
}

/// Pool on `DATABASE_URL` with `schema.sql` applied; only the ignored live-MySQL tests use it.
pub async fn live_pool() -> MySqlPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a MySQL 8 server");
    let pool = MySqlPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
    apply_schema(&pool).await;
    pool
}

pub async fn apply_schema(pool: &MySqlPool) {
    pool.execute(include_str!("../schema.sql")).await.unwrap();
}

pub fn token(role: Role) -> String {
    generate_access_token(
        1,
        format!("{}@company.com", role.as_ref()),
        role.as_ref(),
        JWT_SECRET,
        600,
    )
    .unwrap()
}

pub fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

/// Adds the peer address the rate limiter keys on, plus a bearer token.
pub fn authed(req: TestRequest, role: Role) -> TestRequest {
    anonymous(req).insert_header((header::AUTHORIZATION, format!("Bearer {}", token(role))))
}

pub fn anonymous(req: TestRequest) -> TestRequest {
    req.peer_addr(peer())
}

pub async fn json_of<B: MessageBody>(resp: ServiceResponse<B>) -> (StatusCode, Value) {
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}
