use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::{debug, info};

use super::{
    DailySummaryRow, DivisionReportRow, EmployeePage, EmployeeReportRow, PageRequest, Pagination,
    ReportFilter, SectionReportRow,
};

/// Relational side of reporting. Every query binds its parameters.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn division_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<DivisionReportRow>, sqlx::Error>;

    /// `filter.division_code` must be set.
    async fn section_report(&self, filter: &ReportFilter)
    -> Result<Vec<SectionReportRow>, sqlx::Error>;

    async fn employee_report(
        &self,
        filter: &ReportFilter,
        page: PageRequest,
    ) -> Result<EmployeePage, sqlx::Error>;

    /// Creates the summary table if needed and re-aggregates the full history.
    async fn create_daily_summary_table(&self) -> Result<u64, sqlx::Error>;

    async fn report_from_summary(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<DailySummaryRow>, sqlx::Error>;
}

const DIVISION_SQL: &str = r#"
    SELECT
        division_code,
        division_name,
        COUNT(DISTINCT employee_id) AS total_employees,
        COUNT(DISTINCT attendance_date) AS working_days,
        COUNT(*) AS total_scans,
        COUNT(DISTINCT employee_id, attendance_date) AS employee_days,
        COUNT(DISTINCT CASE WHEN is_present = 1
            THEN CONCAT(employee_id, '|', attendance_date) END) AS present_count
    FROM attendance_reports_optimized
"#;

const SECTION_SQL: &str = r#"
    SELECT
        division_code,
        division_name,
        section_code,
        section_name,
        COUNT(DISTINCT employee_id) AS total_employees,
        COUNT(DISTINCT attendance_date) AS working_days,
        COUNT(*) AS total_scans,
        COUNT(DISTINCT employee_id, attendance_date) AS employee_days,
        COUNT(DISTINCT CASE WHEN is_present = 1
            THEN CONCAT(employee_id, '|', attendance_date) END) AS present_count
    FROM attendance_reports_optimized
"#;

const EMPLOYEE_SQL: &str = r#"
    SELECT
        employee_id,
        MAX(employee_name) AS employee_name,
        MAX(division_code) AS division_code,
        MAX(division_name) AS division_name,
        MAX(section_code) AS section_code,
        MAX(section_name) AS section_name,
        COUNT(DISTINCT attendance_date) AS working_days,
        COUNT(DISTINCT CASE WHEN is_present = 1 THEN attendance_date END) AS present_days,
        COUNT(*) AS total_scans,
        MIN(attendance_date) AS first_date,
        MAX(attendance_date) AS last_date,
        COUNT(*) OVER () AS total_count
    FROM attendance_reports_optimized
"#;

const CREATE_SUMMARY_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS attendance_daily_summary (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        summary_date DATE NOT NULL,
        division_code VARCHAR(50) NOT NULL,
        division_name VARCHAR(255) NOT NULL DEFAULT '',
        section_code VARCHAR(50) NOT NULL,
        section_name VARCHAR(255) NOT NULL DEFAULT '',
        total_employees BIGINT NOT NULL DEFAULT 0,
        present_count BIGINT NOT NULL DEFAULT 0,
        absent_count BIGINT NOT NULL DEFAULT 0,
        total_scans BIGINT NOT NULL DEFAULT 0,
        attendance_percentage DECIMAL(5,2) NOT NULL DEFAULT 0,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        UNIQUE KEY uq_summary_day_division_section (summary_date, division_code, section_code),
        KEY idx_summary_date (summary_date)
    )
"#;

// percentage guarded with NULLIF so empty groups store 0
const REBUILD_SUMMARY_SQL: &str = r#"
    INSERT INTO attendance_daily_summary
        (summary_date, division_code, division_name, section_code, section_name,
         total_employees, present_count, absent_count, total_scans, attendance_percentage)
    SELECT
        attendance_date,
        division_code,
        MAX(division_name),
        section_code,
        MAX(section_name),
        COUNT(DISTINCT employee_id),
        COUNT(DISTINCT CASE WHEN is_present = 1 THEN employee_id END),
        COUNT(DISTINCT employee_id)
            - COUNT(DISTINCT CASE WHEN is_present = 1 THEN employee_id END),
        COUNT(*),
        COALESCE(ROUND(
            COUNT(DISTINCT CASE WHEN is_present = 1 THEN employee_id END) * 100
                / NULLIF(COUNT(DISTINCT employee_id), 0),
            2), 0)
    FROM attendance_reports_optimized
    GROUP BY attendance_date, division_code, section_code
    ON DUPLICATE KEY UPDATE
        division_name = VALUES(division_name),
        section_name = VALUES(section_name),
        total_employees = VALUES(total_employees),
        present_count = VALUES(present_count),
        absent_count = VALUES(absent_count),
        total_scans = VALUES(total_scans),
        attendance_percentage = VALUES(attendance_percentage)
"#;

const SUMMARY_SQL: &str = r#"
    SELECT
        summary_date,
        division_code,
        division_name,
        section_code,
        section_name,
        total_employees,
        present_count,
        absent_count,
        total_scans,
        CAST(attendance_percentage AS DOUBLE) AS attendance_percentage
    FROM attendance_daily_summary
"#;

/// WHERE clause plus its positional string bindings, dates first.
#[derive(Debug, PartialEq)]
pub(crate) struct WhereClause {
    pub sql: String,
    pub codes: Vec<String>,
}

pub(crate) fn where_clause(date_column: &str, filter: &ReportFilter) -> WhereClause {
    let mut conditions = vec![format!("{date_column} BETWEEN ? AND ?")];
    let mut codes = Vec::new();

    if let Some(division) = &filter.division_code {
        conditions.push("division_code = ?".to_string());
        codes.push(division.clone());
    }
    if let Some(section) = &filter.section_code {
        conditions.push("section_code = ?".to_string());
        codes.push(section.clone());
    }

    WhereClause {
        sql: format!("WHERE {}", conditions.join(" AND ")),
        codes,
    }
}

pub struct MySqlReportStore {
    pool: MySqlPool,
}

impl MySqlReportStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn count_employees(&self, filter: &ReportFilter) -> Result<i64, sqlx::Error> {
        let clause = where_clause("attendance_date", filter);
        let sql = format!(
            "SELECT COUNT(DISTINCT employee_id) FROM attendance_reports_optimized {}",
            clause.sql
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.start_date)
            .bind(filter.end_date);
        for code in &clause.codes {
            query = query.bind(code);
        }
        query.fetch_one(&self.pool).await
    }
}

fn bind_range<'q, O>(
    query: sqlx::query::QueryAs<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments>,
    start: NaiveDate,
    end: NaiveDate,
    codes: &'q [String],
) -> sqlx::query::QueryAs<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments> {
    let mut query = query.bind(start).bind(end);
    for code in codes {
        query = query.bind(code);
    }
    query
}

#[async_trait]
impl ReportStore for MySqlReportStore {
    async fn division_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<DivisionReportRow>, sqlx::Error> {
        let clause = where_clause("attendance_date", filter);
        let sql = format!(
            "{DIVISION_SQL} {} GROUP BY division_code, division_name ORDER BY division_code",
            clause.sql
        );
        debug!(sql = %sql, codes = ?clause.codes, "Division report query");

        let rows = bind_range(
            sqlx::query_as::<_, DivisionReportRow>(&sql),
            filter.start_date,
            filter.end_date,
            &clause.codes,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DivisionReportRow::finish).collect())
    }

    async fn section_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<SectionReportRow>, sqlx::Error> {
        let clause = where_clause("attendance_date", filter);
        let sql = format!(
            "{SECTION_SQL} {} \
             GROUP BY division_code, division_name, section_code, section_name \
             ORDER BY section_code",
            clause.sql
        );
        debug!(sql = %sql, codes = ?clause.codes, "Section report query");

        let rows = bind_range(
            sqlx::query_as::<_, SectionReportRow>(&sql),
            filter.start_date,
            filter.end_date,
            &clause.codes,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SectionReportRow::finish).collect())
    }

    async fn employee_report(
        &self,
        filter: &ReportFilter,
        page: PageRequest,
    ) -> Result<EmployeePage, sqlx::Error> {
        let clause = where_clause("attendance_date", filter);
        let sql = format!(
            "{EMPLOYEE_SQL} {} GROUP BY employee_id ORDER BY employee_id LIMIT ? OFFSET ?",
            clause.sql
        );
        debug!(sql = %sql, codes = ?clause.codes, page = page.page, limit = page.limit, "Employee report query");

        let rows = bind_range(
            sqlx::query_as::<_, EmployeeReportRow>(&sql),
            filter.start_date,
            filter.end_date,
            &clause.codes,
        )
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        // a page past the end carries no window total
        let total = match rows.first() {
            Some(row) => row.total_count,
            None if page.page > 1 => self.count_employees(filter).await?,
            None => 0,
        };

        Ok(EmployeePage {
            records: rows.into_iter().map(EmployeeReportRow::finish).collect(),
            pagination: Pagination::new(page, total),
        })
    }

    async fn create_daily_summary_table(&self) -> Result<u64, sqlx::Error> {
        sqlx::query(CREATE_SUMMARY_TABLE_SQL)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query(REBUILD_SUMMARY_SQL)
            .execute(&self.pool)
            .await?;

        info!(rows_affected = result.rows_affected(), "Daily summary rebuilt");
        Ok(result.rows_affected())
    }

    async fn report_from_summary(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<DailySummaryRow>, sqlx::Error> {
        let clause = where_clause("summary_date", filter);
        let sql = format!(
            "{SUMMARY_SQL} {} ORDER BY summary_date, division_code, section_code",
            clause.sql
        );

        bind_range(
            sqlx::query_as::<_, DailySummaryRow>(&sql),
            filter.start_date,
            filter.end_date,
            &clause.codes,
        )
        .fetch_all(&self.pool)
        .await
    }
}
