use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{
    DailySummaryRow, DivisionReportRow, EmployeePage, PageRequest, ReportFilter, ReportKind,
    ReportStore, SectionReportRow,
};
use crate::cache::ReportCache;
use crate::error::ApiError;

pub const CACHE_PREFIX: &str = "attendance:report:";

#[derive(Debug, Clone, Copy)]
pub struct ReportTtl {
    /// Division and section reports
    pub aggregate_secs: u64,
    /// First page of the employee report; later pages are never cached
    pub employee_first_page_secs: u64,
}

impl Default for ReportTtl {
    fn default() -> Self {
        Self {
            aggregate_secs: 3600,
            employee_first_page_secs: 1800,
        }
    }
}

#[derive(Debug)]
pub struct ReportOutcome<T> {
    pub data: T,
    pub cached: bool,
    pub query_time: Duration,
}

/// Cache-aside over the aggregation queries. Without a cache every call
/// goes straight to the store; cache failures are logged and bypassed.
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    cache: Option<Arc<dyn ReportCache>>,
    ttl: ReportTtl,
}

/// Codes are written as JSON (`null` or a quoted, escaped string) so an absent
/// filter and any code value, `:` included, always give different keys.
pub fn cache_key(kind: ReportKind, filter: &ReportFilter, page: Option<PageRequest>) -> String {
    let mut key = format!(
        "{CACHE_PREFIX}{kind}:{}:{}:d={}:s={}",
        filter.start_date,
        filter.end_date,
        json!(filter.division_code),
        json!(filter.section_code),
    );
    if let Some(page) = page {
        key.push_str(&format!(":p{}:l{}", page.page, page.limit));
    }
    key
}

impl ReportService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        cache: Option<Arc<dyn ReportCache>>,
        ttl: ReportTtl,
    ) -> Self {
        if cache.is_none() {
            warn!("Report cache disabled, reports will query MySQL directly");
        }
        Self { store, cache, ttl }
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    #[instrument(name = "division_report", skip(self))]
    pub async fn division_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<ReportOutcome<Vec<DivisionReportRow>>, ApiError> {
        let key = cache_key(ReportKind::Division, filter, None);
        self.cached_or_fetch(Some(key), self.ttl.aggregate_secs, || {
            self.store.division_report(filter)
        })
        .await
    }

    #[instrument(name = "section_report", skip(self))]
    pub async fn section_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<ReportOutcome<Vec<SectionReportRow>>, ApiError> {
        if filter.division_code.is_none() {
            return Err(ApiError::validation("division_code is required"));
        }
        let key = cache_key(ReportKind::Section, filter, None);
        self.cached_or_fetch(Some(key), self.ttl.aggregate_secs, || {
            self.store.section_report(filter)
        })
        .await
    }

    #[instrument(name = "employee_report", skip(self))]
    pub async fn employee_report(
        &self,
        filter: &ReportFilter,
        page: PageRequest,
    ) -> Result<ReportOutcome<EmployeePage>, ApiError> {
        let key = (page.page == 1).then(|| cache_key(ReportKind::Employee, filter, Some(page)));
        self.cached_or_fetch(key, self.ttl.employee_first_page_secs, || {
            self.store.employee_report(filter, page)
        })
        .await
    }

    /// Fastest tier: a plain read of the materialized summary, never cached.
    pub async fn summary_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<ReportOutcome<Vec<DailySummaryRow>>, ApiError> {
        let started = Instant::now();
        let data = self.store.report_from_summary(filter).await?;
        Ok(ReportOutcome {
            data,
            cached: false,
            query_time: started.elapsed(),
        })
    }

    /// Full-history rebuild of the daily summary, then drops cached reports.
    pub async fn rebuild_summary(&self) -> Result<ReportOutcome<u64>, ApiError> {
        let started = Instant::now();
        let rows = self.store.create_daily_summary_table().await?;
        self.invalidate().await;
        Ok(ReportOutcome {
            data: rows,
            cached: false,
            query_time: started.elapsed(),
        })
    }

    /// Deletes every cached report. Errors are logged, the count is then 0.
    pub async fn invalidate(&self) -> u64 {
        let Some(cache) = &self.cache else {
            return 0;
        };
        match cache.delete_prefix(CACHE_PREFIX).await {
            Ok(removed) => {
                info!(removed, "Report cache invalidated");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Report cache invalidation failed");
                0
            }
        }
    }

    async fn cached_or_fetch<T, F, Fut>(
        &self,
        key: Option<String>,
        ttl_secs: u64,
        fetch: F,
    ) -> Result<ReportOutcome<T>, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let started = Instant::now();
        let cache = self.cache.as_ref().zip(key.as_ref());

        if let Some((cache, key)) = cache {
            match cache.get(key).await {
                Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                    Ok(data) => {
                        debug!(key = %key, "Report cache hit");
                        return Ok(ReportOutcome {
                            data,
                            cached: true,
                            query_time: started.elapsed(),
                        });
                    }
                    Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cache entry"),
                },
                Ok(None) => debug!(key = %key, "Report cache miss"),
                Err(e) => warn!(key = %key, error = %e, "Report cache read failed"),
            }
        }

        let data = fetch().await?;
        let query_time = started.elapsed();

        if let Some((cache, key)) = cache {
            match serde_json::to_string(&data) {
                Ok(raw) => {
                    if let Err(e) = cache.set_ex(key, &raw, ttl_secs).await {
                        warn!(key = %key, error = %e, "Report cache write failed");
                    }
                }
                Err(e) => warn!(key = %key, error = %e, "Report serialization failed"),
            }
        }

        Ok(ReportOutcome {
            data,
            cached: false,
            query_time,
        })
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::report::{EmployeeReportRow, Pagination};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose division counts can be changed between calls.
    #[derive(Default)]
    pub struct FakeReportStore {
        pub division_calls: AtomicUsize,
        pub employee_calls: AtomicUsize,
        pub rebuilds: AtomicUsize,
        pub present_count: Mutex<i64>,
        pub employees: Mutex<Vec<String>>,
    }

    pub fn division_row(present: i64) -> DivisionReportRow {
        DivisionReportRow {
            division_code: "DIV001".into(),
            division_name: "Production".into(),
            total_employees: 10,
            working_days: 20,
            total_scans: 380,
            employee_days: 190,
            present_count: present,
            absent_count: 0,
            attendance_percentage: 0.0,
        }
        .finish()
    }

    fn employee_row(id: &str, total: i64) -> EmployeeReportRow {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        EmployeeReportRow {
            employee_id: id.into(),
            employee_name: format!("Employee {id}"),
            division_code: "DIV001".into(),
            division_name: "Production".into(),
            section_code: "SEC010".into(),
            section_name: "Assembly".into(),
            working_days: 4,
            present_days: 3,
            total_scans: 8,
            first_date: day,
            last_date: day,
            absent_days: 0,
            attendance_percentage: 0.0,
            total_count: total,
        }
        .finish()
    }

    #[async_trait]
    impl ReportStore for FakeReportStore {
        async fn division_report(
            &self,
            _filter: &ReportFilter,
        ) -> Result<Vec<DivisionReportRow>, sqlx::Error> {
            self.division_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![division_row(*self.present_count.lock().unwrap())])
        }

        async fn section_report(
            &self,
            filter: &ReportFilter,
        ) -> Result<Vec<SectionReportRow>, sqlx::Error> {
            Ok(vec![
                SectionReportRow {
                    division_code: filter.division_code.clone().unwrap_or_default(),
                    division_name: "Production".into(),
                    section_code: "SEC010".into(),
                    section_name: "Assembly".into(),
                    total_employees: 0,
                    working_days: 0,
                    total_scans: 0,
                    employee_days: 0,
                    present_count: 0,
                    absent_count: 0,
                    attendance_percentage: 0.0,
                }
                .finish(),
            ])
        }

        async fn employee_report(
            &self,
            _filter: &ReportFilter,
            page: PageRequest,
        ) -> Result<EmployeePage, sqlx::Error> {
            self.employee_calls.fetch_add(1, Ordering::SeqCst);
            let mut all = self.employees.lock().unwrap().clone();
            all.sort();
            let total = all.len() as i64;
            let records: Vec<_> = all
                .iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .map(|id| employee_row(id, total))
                .collect();
            Ok(EmployeePage {
                records,
                pagination: Pagination::new(page, total),
            })
        }

        async fn create_daily_summary_table(&self) -> Result<u64, sqlx::Error> {
            self.rebuilds.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        }

        async fn report_from_summary(
            &self,
            _filter: &ReportFilter,
        ) -> Result<Vec<DailySummaryRow>, sqlx::Error> {
            Ok(Vec::new())
        }
    }
}
