//! Attendance reporting: aggregation queries, the cache-aside wrapper and the
//! materialized daily summary.

pub mod service;
pub mod store;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use utoipa::ToSchema;

pub use service::{ReportService, ReportTtl};
pub use store::{MySqlReportStore, ReportStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReportKind {
    Division,
    Section,
    Employee,
}

/// Date range plus optional org scoping shared by every report tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub division_code: Option<String>,
    pub section_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// `round(present / max(denominator, 1) * 100, 2)`, never NaN or negative.
pub fn attendance_percentage(present: i64, denominator: i64) -> f64 {
    let present = present.max(0) as f64;
    let denominator = denominator.max(1) as f64;
    (present / denominator * 100.0 * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DivisionReportRow {
    #[schema(example = "DIV001")]
    pub division_code: String,
    #[schema(example = "Production")]
    pub division_name: String,
    pub total_employees: i64,
    /// Distinct dates with at least one scan
    pub working_days: i64,
    pub total_scans: i64,
    /// Distinct (employee, date) pairs, the percentage denominator
    pub employee_days: i64,
    pub present_count: i64,
    #[sqlx(skip)]
    pub absent_count: i64,
    #[sqlx(skip)]
    pub attendance_percentage: f64,
}

impl DivisionReportRow {
    pub fn finish(mut self) -> Self {
        self.absent_count = (self.employee_days - self.present_count).max(0);
        self.attendance_percentage = attendance_percentage(self.present_count, self.employee_days);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SectionReportRow {
    pub division_code: String,
    pub division_name: String,
    #[schema(example = "SEC010")]
    pub section_code: String,
    #[schema(example = "Assembly")]
    pub section_name: String,
    pub total_employees: i64,
    pub working_days: i64,
    pub total_scans: i64,
    pub employee_days: i64,
    pub present_count: i64,
    #[sqlx(skip)]
    pub absent_count: i64,
    #[sqlx(skip)]
    pub attendance_percentage: f64,
}

impl SectionReportRow {
    pub fn finish(mut self) -> Self {
        self.absent_count = (self.employee_days - self.present_count).max(0);
        self.attendance_percentage = attendance_percentage(self.present_count, self.employee_days);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeReportRow {
    #[schema(example = "E10023")]
    pub employee_id: String,
    pub employee_name: String,
    pub division_code: String,
    pub division_name: String,
    pub section_code: String,
    pub section_name: String,
    pub working_days: i64,
    pub present_days: i64,
    pub total_scans: i64,
    #[schema(value_type = String, format = "date")]
    pub first_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub last_date: NaiveDate,
    #[sqlx(skip)]
    pub absent_days: i64,
    #[sqlx(skip)]
    pub attendance_percentage: f64,
    /// Window total carried on every row of the page
    #[serde(skip)]
    pub total_count: i64,
}

impl EmployeeReportRow {
    pub fn finish(mut self) -> Self {
        self.absent_days = (self.working_days - self.present_days).max(0);
        self.attendance_percentage = attendance_percentage(self.present_days, self.working_days);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_records: i64,
    pub total_pages: i64,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(page: PageRequest, total_records: i64) -> Self {
        let limit = i64::from(page.limit);
        let total_pages = (total_records.max(0) + limit - 1) / limit;
        Self {
            page: page.page,
            limit: page.limit,
            total_records,
            total_pages,
            has_next: i64::from(page.page) < total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmployeePage {
    pub records: Vec<EmployeeReportRow>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DailySummaryRow {
    #[schema(value_type = String, format = "date")]
    pub summary_date: NaiveDate,
    pub division_code: String,
    pub division_name: String,
    pub section_code: String,
    pub section_name: String,
    pub total_employees: i64,
    pub present_count: i64,
    pub absent_count: i64,
    pub total_scans: i64,
    pub attendance_percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_guarded_and_rounded() {
        assert_eq!(attendance_percentage(0, 0), 0.0);
        assert_eq!(attendance_percentage(3, 0), 300.0);
        assert_eq!(attendance_percentage(-4, 10), 0.0);
        assert_eq!(attendance_percentage(2, 3), 66.67);
        assert_eq!(attendance_percentage(1, 8), 12.5);
        assert_eq!(attendance_percentage(10, 10), 100.0);
        assert!(!attendance_percentage(0, -5).is_nan());
    }

    #[test]
    fn finishing_a_row_derives_absent_and_percentage() {
        let row = DivisionReportRow {
            division_code: "DIV001".into(),
            division_name: "Production".into(),
            total_employees: 4,
            working_days: 5,
            total_scans: 31,
            employee_days: 18,
            present_count: 15,
            absent_count: 0,
            attendance_percentage: 0.0,
        }
        .finish();

        assert_eq!(row.absent_count, 3);
        assert_eq!(row.attendance_percentage, 83.33);
        assert!(row.present_count <= row.total_employees * row.working_days);
    }

    #[test]
    fn empty_group_has_zero_percentage() {
        let row = SectionReportRow {
            division_code: "DIV001".into(),
            division_name: String::new(),
            section_code: "SEC010".into(),
            section_name: String::new(),
            total_employees: 0,
            working_days: 0,
            total_scans: 0,
            employee_days: 0,
            present_count: 0,
            absent_count: 0,
            attendance_percentage: 0.0,
        }
        .finish();
        assert_eq!(row.attendance_percentage, 0.0);
        assert_eq!(row.absent_count, 0);
    }

    #[test]
    fn page_request_clamps_and_offsets() {
        let page = PageRequest::new(Some(0), Some(10_000));
        assert_eq!(page, PageRequest { page: 1, limit: PageRequest::MAX_LIMIT });
        assert_eq!(page.offset(), 0);

        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
        assert_eq!(PageRequest::new(None, None).limit, PageRequest::DEFAULT_LIMIT);
    }

    #[test]
    fn pagination_counts_pages() {
        let p = Pagination::new(PageRequest::new(Some(2), Some(10)), 21);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);

        let last = Pagination::new(PageRequest::new(Some(3), Some(10)), 21);
        assert!(!last.has_next);

        let empty = Pagination::new(PageRequest::new(None, Some(10)), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }
}
