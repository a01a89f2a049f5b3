use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    report::{
        DailySummaryRow, DivisionReportRow, EmployeePage, PageRequest, ReportFilter,
        ReportService, SectionReportRow,
    },
    response::{self, Meta},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::info;
use utoipa::IntoParams;

/// Query string shared by the report endpoints. Both snake_case and
/// camelCase names are accepted.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// YYYY-MM-DD, inclusive
    #[serde(alias = "startDate")]
    #[param(example = "2025-12-11")]
    pub start_date: Option<String>,
    /// YYYY-MM-DD, inclusive
    #[serde(alias = "endDate")]
    #[param(example = "2026-01-10")]
    pub end_date: Option<String>,
    #[serde(alias = "divisionCode")]
    pub division_code: Option<String>,
    #[serde(alias = "sectionCode")]
    pub section_code: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ReportQuery {
    pub fn filter(&self) -> Result<ReportFilter, ApiError> {
        let (Some(start), Some(end)) = (non_empty(&self.start_date), non_empty(&self.end_date))
        else {
            return Err(ApiError::validation("start_date and end_date are required"));
        };

        let start_date = parse_date("start_date", start)?;
        let end_date = parse_date("end_date", end)?;
        if start_date > end_date {
            return Err(ApiError::validation("start_date must not be after end_date"));
        }

        Ok(ReportFilter {
            start_date,
            end_date,
            division_code: non_empty(&self.division_code).map(str::to_string),
            section_code: non_empty(&self.section_code).map(str::to_string),
        })
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("{name} must be a date in YYYY-MM-DD format")))
}

/// Division-level attendance report
#[utoipa::path(
    get,
    path = "/api/reports/ultra-fast/division",
    params(ReportQuery),
    responses(
        (status = 200, description = "One row per division", body = [DivisionReportRow]),
        (status = 400, description = "Missing or malformed dates", body = Object, example = json!({
            "success": false,
            "message": "start_date and end_date are required"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn division_report(
    reports: web::Data<ReportService>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let filter = query.filter()?;

    let outcome = reports.division_report(&filter).await?;
    let meta = Meta::new(outcome.query_time, started, outcome.data.len(), outcome.cached);
    Ok(response::with_meta(outcome.data, meta))
}

/// Section-level attendance report for one division
#[utoipa::path(
    get,
    path = "/api/reports/ultra-fast/section",
    params(ReportQuery),
    responses(
        (status = 200, description = "One row per section", body = [SectionReportRow]),
        (status = 400, description = "Missing dates or division_code"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn section_report(
    reports: web::Data<ReportService>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let filter = query.filter()?;

    let outcome = reports.section_report(&filter).await?;
    let meta = Meta::new(outcome.query_time, started, outcome.data.len(), outcome.cached);
    Ok(response::with_meta(outcome.data, meta))
}

/// Paginated employee-level attendance report
#[utoipa::path(
    get,
    path = "/api/reports/ultra-fast/employee",
    params(ReportQuery),
    responses(
        (status = 200, description = "One page of employees", body = EmployeePage),
        (status = 400, description = "Missing or malformed dates"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn employee_report(
    reports: web::Data<ReportService>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let filter = query.filter()?;

    let outcome = reports.employee_report(&filter, query.page()).await?;
    let meta = Meta::new(
        outcome.query_time,
        started,
        outcome.data.records.len(),
        outcome.cached,
    );
    Ok(response::with_meta(outcome.data, meta))
}

/// Read of the materialized daily summary
#[utoipa::path(
    get,
    path = "/api/reports/ultra-fast/summary",
    params(ReportQuery),
    responses(
        (status = 200, description = "Daily summary rows", body = [DailySummaryRow]),
        (status = 400, description = "Missing or malformed dates"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn summary_report(
    reports: web::Data<ReportService>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let filter = query.filter()?;

    let outcome = reports.summary_report(&filter).await?;
    let meta = Meta::new(outcome.query_time, started, outcome.data.len(), outcome.cached);
    Ok(response::with_meta(outcome.data, meta))
}

/// Rebuild the daily summary from the full attendance history
#[utoipa::path(
    post,
    path = "/api/reports/ultra-fast/summary/rebuild",
    responses(
        (status = 200, description = "Summary rebuilt", body = Object, example = json!({
            "success": true,
            "data": { "rows_affected": 1240 }
        })),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn rebuild_summary(
    auth: AuthUser,
    reports: web::Data<ReportService>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let started = Instant::now();

    let outcome = reports.rebuild_summary().await?;
    info!(rows = outcome.data, by = %auth.email, "Daily summary rebuilt");

    let meta = Meta::new(outcome.query_time, started, 1, false);
    Ok(response::with_meta(json!({ "rows_affected": outcome.data }), meta))
}

/// Drop every cached report
#[utoipa::path(
    delete,
    path = "/api/reports/ultra-fast/cache",
    responses(
        (status = 200, description = "Cached reports removed", body = Object, example = json!({
            "success": true,
            "data": { "removed": 12, "cache_enabled": true },
            "message": "Report cache cleared"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn clear_report_cache(
    auth: AuthUser,
    reports: web::Data<ReportService>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let removed = reports.invalidate().await;
    Ok(response::with_message(
        json!({ "removed": removed, "cache_enabled": reports.cache_enabled() }),
        "Report cache cleared",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::test_support::{TestApp, anonymous, authed, json_of};
    use actix_web::{
        http::StatusCode,
        test::{self, TestRequest},
    };
    use std::sync::atomic::Ordering;

    fn query(start: &str, end: &str) -> ReportQuery {
        ReportQuery {
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            ..Default::default()
        }
    }

    #[test]
    fn filter_requires_well_ordered_dates() {
        assert!(query("2026-01-01", "2026-01-31").filter().is_ok());
        assert!(query("2026-01-01", "2026-01-01").filter().is_ok());

        let err = query("2026-02-01", "2026-01-31").filter().unwrap_err();
        assert!(err.to_string().contains("after"));

        let err = query("01/02/2026", "2026-01-31").filter().unwrap_err();
        assert!(err.to_string().contains("start_date"));

        let err = ReportQuery::default().filter().unwrap_err();
        assert_eq!(err.to_string(), "start_date and end_date are required");
    }

    #[test]
    fn blank_codes_mean_no_scope() {
        let mut q = query("2026-01-01", "2026-01-31");
        q.division_code = Some("  ".into());
        q.section_code = Some(" SEC010 ".into());

        let filter = q.filter().unwrap();
        assert_eq!(filter.division_code, None);
        assert_eq!(filter.section_code.as_deref(), Some("SEC010"));
    }

    #[test]
    fn camel_case_names_are_accepted() {
        let q = web::Query::<ReportQuery>::from_query(
            "startDate=2026-01-01&endDate=2026-01-31&divisionCode=DIV001&page=2&limit=25",
        )
        .unwrap()
        .into_inner();
        let filter = q.filter().unwrap();
        assert_eq!(filter.division_code.as_deref(), Some("DIV001"));
        assert_eq!(q.page(), PageRequest { page: 2, limit: 25 });
    }

    #[actix_web::test]
    async fn division_report_wraps_rows_with_meta() {
        let app = TestApp::default();
        *app.store.present_count.lock().unwrap() = 150;
        let svc = test::init_service(app.build()).await;

        let uri = "/api/reports/ultra-fast/division?start_date=2025-12-11&end_date=2026-01-10";
        let req = authed(TestRequest::get().uri(uri), Role::Clerk).to_request();
        let (status, first) = json_of(test::call_service(&svc, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], true);
        assert_eq!(first["data"][0]["present_count"], 150);
        assert_eq!(first["meta"]["recordCount"], 1);
        assert_eq!(first["meta"]["cached"], false);

        let req = authed(TestRequest::get().uri(uri), Role::Clerk).to_request();
        let (_, second) = json_of(test::call_service(&svc, req).await).await;
        assert_eq!(second["meta"]["cached"], true);
        assert_eq!(first["data"], second["data"]);
        assert_eq!(app.store.division_calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn missing_dates_are_a_bad_request() {
        let app = TestApp::default();
        let svc = test::init_service(app.build()).await;

        let req = authed(
            TestRequest::get().uri("/api/reports/ultra-fast/division?start_date=2026-01-01"),
            Role::Admin,
        );
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "start_date and end_date are required");
    }

    #[actix_web::test]
    async fn malformed_page_is_a_bad_request_envelope() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(
            TestRequest::get().uri(
                "/api/reports/ultra-fast/employee?start_date=2026-01-01&end_date=2026-01-31&page=first",
            ),
            Role::Admin,
        );
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn section_report_without_division_is_rejected() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(
            TestRequest::get()
                .uri("/api/reports/ultra-fast/section?startDate=2026-01-01&endDate=2026-01-31"),
            Role::Admin,
        );
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "division_code is required");
    }

    #[actix_web::test]
    async fn employee_report_reports_page_size_and_totals() {
        let app = TestApp::default();
        *app.store.employees.lock().unwrap() = (1..=5).map(|i| format!("E{i:03}")).collect();
        let svc = test::init_service(app.build()).await;

        let req = authed(
            TestRequest::get().uri(
                "/api/reports/ultra-fast/employee?start_date=2026-01-01&end_date=2026-01-31&page=2&limit=2",
            ),
            Role::Clerk,
        );
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["recordCount"], 2);
        assert_eq!(body["data"]["pagination"]["total_records"], 5);
        assert_eq!(body["data"]["pagination"]["total_pages"], 3);
        assert_eq!(body["data"]["records"][0]["employee_id"], "E003");
    }

    #[actix_web::test]
    async fn rebuild_is_admin_only() {
        let app = TestApp::default();
        let svc = test::init_service(app.build()).await;
        let uri = "/api/reports/ultra-fast/summary/rebuild";

        let req = authed(TestRequest::post().uri(uri), Role::Clerk).to_request();
        let resp = test::call_service(&svc, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.store.rebuilds.load(Ordering::SeqCst), 0);

        let req = authed(TestRequest::post().uri(uri), Role::SuperAdmin).to_request();
        let (status, body) = json_of(test::call_service(&svc, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["rows_affected"], 42);
        assert_eq!(app.store.rebuilds.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn reports_need_a_token() {
        let svc = test::init_service(TestApp::default().build()).await;
        let req = anonymous(
            TestRequest::get()
                .uri("/api/reports/ultra-fast/division?start_date=2026-01-01&end_date=2026-01-31"),
        );
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn clearing_the_cache_forces_a_fresh_query() {
        let app = TestApp::default();
        let svc = test::init_service(app.build()).await;
        let uri = "/api/reports/ultra-fast/division?start_date=2026-01-01&end_date=2026-01-31";

        test::call_service(&svc, authed(TestRequest::get().uri(uri), Role::Admin).to_request()).await;

        let req = authed(TestRequest::delete().uri("/api/reports/ultra-fast/cache"), Role::Admin);
        let (_, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(body["data"]["removed"], 1);
        assert!(app.report_cache.keys().is_empty());

        let req = authed(TestRequest::get().uri(uri), Role::Admin);
        let (_, again) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(again["meta"]["cached"], false);
        assert_eq!(app.store.division_calls.load(Ordering::SeqCst), 2);
    }
}
