use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use sqlx::MySqlPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::model::employee::{Employee, fetch_active_employees};
use crate::model::sub_section::{SubSection, fetch_sub_sections};

pub const SUB_SECTIONS_KEY: &str = "subsections";
pub const USERS_KEY: &str = "users";
pub const ATTENDANCE_COUNT_KEY: &str = "attendance_count";

const MAX_ENTRIES: u64 = 1_000;

#[derive(Debug, Clone)]
pub enum Dataset {
    SubSections(Arc<Vec<SubSection>>),
    Users(Arc<Vec<Employee>>),
    AttendanceCount(i64),
}

/// Where cached datasets come from on a miss.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn sub_sections(&self) -> Result<Vec<SubSection>, sqlx::Error>;
    async fn users(&self) -> Result<Vec<Employee>, sqlx::Error>;
    async fn attendance_count(&self) -> Result<i64, sqlx::Error>;
}

pub struct MySqlDatasetSource {
    pool: MySqlPool,
}

impl MySqlDatasetSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetSource for MySqlDatasetSource {
    async fn sub_sections(&self) -> Result<Vec<SubSection>, sqlx::Error> {
        fetch_sub_sections(&self.pool, None).await
    }

    async fn users(&self) -> Result<Vec<Employee>, sqlx::Error> {
        fetch_active_employees(&self.pool).await
    }

    async fn attendance_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance_reports_optimized")
            .fetch_one(&self.pool)
            .await
    }
}

/// A dataset read plus whether it was served from memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub value: T,
    pub hit: bool,
}

impl<T> Lookup<T> {
    fn hit(value: T) -> Self {
        Self { value, hit: true }
    }

    fn miss(value: T) -> Self {
        Self { value, hit: false }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheStatus {
    pub ready: bool,
    pub entries: u64,
    pub ttl_secs: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_initialized: Option<DateTime<Utc>>,
}

/// In-process TTL cache over a few hot datasets. Entries expire lazily:
/// a read older than the TTL is treated as absent and refetched.
pub struct DatasetCache {
    entries: Cache<String, Dataset>,
    ready: AtomicBool,
    last_initialized: RwLock<Option<DateTime<Utc>>>,
    ttl: Duration,
    source: Arc<dyn DatasetSource>,
}

impl DatasetCache {
    pub fn new(source: Arc<dyn DatasetSource>, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            ready: AtomicBool::new(false),
            last_initialized: RwLock::new(None),
            ttl,
            source,
        }
    }

    pub async fn set(&self, key: &str, value: Dataset) {
        self.entries.insert(key.to_string(), value).await;
    }

    pub async fn get(&self, key: &str) -> Option<Dataset> {
        self.entries.get(key).await
    }

    /// Loads every dataset concurrently, then flips the ready flag.
    /// Not guarded against a concurrent second call; both would just refetch.
    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        let started = Instant::now();

        let (sub_sections, users, attendance_count) = futures::try_join!(
            self.source.sub_sections(),
            self.source.users(),
            self.source.attendance_count(),
        )?;

        let counts = (sub_sections.len(), users.len());
        self.set(SUB_SECTIONS_KEY, Dataset::SubSections(Arc::new(sub_sections)))
            .await;
        self.set(USERS_KEY, Dataset::Users(Arc::new(users))).await;
        self.set(ATTENDANCE_COUNT_KEY, Dataset::AttendanceCount(attendance_count))
            .await;

        if let Ok(mut last) = self.last_initialized.write() {
            *last = Some(Utc::now());
        }
        self.ready.store(true, Ordering::Release);

        info!(
            sub_sections = counts.0,
            users = counts.1,
            attendance_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dataset cache initialized"
        );
        Ok(())
    }

    /// Drops one dataset so the next read goes back to the source.
    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub async fn clear(&self) {
        self.ready.store(false, Ordering::Release);
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        info!("Dataset cache cleared");
    }

    pub async fn status(&self) -> CacheStatus {
        self.entries.run_pending_tasks().await;
        CacheStatus {
            ready: self.is_ready(),
            entries: self.entries.entry_count(),
            ttl_secs: self.ttl.as_secs(),
            last_initialized: self.last_initialized.read().ok().and_then(|l| *l),
        }
    }

    pub async fn sub_sections(&self) -> Result<Lookup<Arc<Vec<SubSection>>>, sqlx::Error> {
        if let Some(Dataset::SubSections(rows)) = self.get(SUB_SECTIONS_KEY).await {
            return Ok(Lookup::hit(rows));
        }
        let rows = Arc::new(self.source.sub_sections().await?);
        self.set(SUB_SECTIONS_KEY, Dataset::SubSections(rows.clone()))
            .await;
        Ok(Lookup::miss(rows))
    }

    pub async fn users(&self) -> Result<Lookup<Arc<Vec<Employee>>>, sqlx::Error> {
        if let Some(Dataset::Users(rows)) = self.get(USERS_KEY).await {
            return Ok(Lookup::hit(rows));
        }
        let rows = Arc::new(self.source.users().await?);
        self.set(USERS_KEY, Dataset::Users(rows.clone())).await;
        Ok(Lookup::miss(rows))
    }

    pub async fn attendance_count(&self) -> Result<Lookup<i64>, sqlx::Error> {
        if let Some(Dataset::AttendanceCount(count)) = self.get(ATTENDANCE_COUNT_KEY).await {
            return Ok(Lookup::hit(count));
        }
        let count = self.source.attendance_count().await?;
        self.set(ATTENDANCE_COUNT_KEY, Dataset::AttendanceCount(count))
            .await;
        Ok(Lookup::miss(count))
    }
}

/// Startup warmup; failure leaves the cache not ready and is only logged.
pub async fn warmup_dataset_cache(cache: &DatasetCache) {
    if let Err(e) = cache.initialize().await {
        warn!(error = %e, "Dataset cache warmup failed, cache stays not ready");
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;

    /// Counts how often each dataset is loaded.
    #[derive(Default)]
    pub struct CountingSource {
        pub sub_section_loads: AtomicUsize,
        pub user_loads: AtomicUsize,
        pub count_loads: AtomicUsize,
        pub fail: AtomicBool,
    }

    pub fn sample_sub_section(id: u64, code: &str) -> SubSection {
        let at = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        SubSection {
            id,
            section_id: 10,
            section_code: "SEC010".into(),
            section_name: "Assembly".into(),
            division_id: 1,
            division_code: "DIV001".into(),
            code: code.into(),
            name: format!("Line {code}"),
            is_active: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[async_trait]
    impl DatasetSource for CountingSource {
        async fn sub_sections(&self) -> Result<Vec<SubSection>, sqlx::Error> {
            self.sub_section_loads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(sqlx::Error::PoolTimedOut);
            }
            Ok(vec![sample_sub_section(1, "SUB001"), sample_sub_section(2, "SUB002")])
        }

        async fn users(&self) -> Result<Vec<Employee>, sqlx::Error> {
            self.user_loads.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn attendance_count(&self) -> Result<i64, sqlx::Error> {
            self.count_loads.fetch_add(1, Ordering::SeqCst);
            Ok(4_210)
        }
    }
}
