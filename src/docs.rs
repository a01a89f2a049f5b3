use crate::api::cache::CacheOverview;
use crate::api::dashboard::DashboardStats;
use crate::api::division::CreateDivision;
use crate::api::employee::EmployeeListResponse;
use crate::api::section::CreateSection;
use crate::api::sub_section::CreateSubSection;
use crate::api::transfer::TransferRequest;
use crate::auth::handlers::LoginResponse;
use crate::cache::CacheStatus;
use crate::model::{
    activity::RecentActivity, division::Division, employee::Employee, section::Section,
    sub_section::SubSection, transfer::TransferredEmployee,
};
use crate::models::LoginReqDto;
use crate::report::{
    DailySummaryRow, DivisionReportRow, EmployeePage, EmployeeReportRow, Pagination,
    SectionReportRow,
};
use crate::response::Meta;
use crate::services::sync::SyncSummary;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Hub API",
        version = "1.0.0",
        description = r#"
## Attendance reporting and HR administration

Backend for HR administrators: organizational hierarchy, employees mirrored
from the HRIS, and attendance reports over the scan history.

### Key Features
- **Organization**: divisions, sections and sub-sections, with employee transfers
- **Reports**: division, section and employee attendance, cached in Redis,
  plus a materialized daily summary
- **Datasets**: hot lists kept in an in-process cache
- **HRIS sync**: mirror divisions, sections and employees on demand

### Security
Every `/api` endpoint needs a **JWT Bearer** token from `/auth/login`.
Changes to organizational data are limited to **admin** and **super_admin**.

### Response Format
`{ "success": true, "data": ..., "meta": { queryTime, totalTime, recordCount, cached, timestamp } }`
on success, `{ "success": false, "message": ... }` on failure.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::division::list_divisions,
        crate::api::division::get_division,
        crate::api::division::create_division,
        crate::api::division::update_division,
        crate::api::division::delete_division,

        crate::api::section::list_sections,
        crate::api::section::get_section,
        crate::api::section::create_section,
        crate::api::section::update_section,
        crate::api::section::delete_section,

        crate::api::sub_section::list_sub_sections,
        crate::api::sub_section::get_sub_section,
        crate::api::sub_section::create_sub_section,
        crate::api::sub_section::update_sub_section,
        crate::api::sub_section::delete_sub_section,

        crate::api::transfer::transfer_employee,
        crate::api::transfer::list_transfers,
        crate::api::transfer::recall_employee,

        crate::api::employee::list_employees,
        crate::api::employee::get_employee,

        crate::api::report::division_report,
        crate::api::report::section_report,
        crate::api::report::employee_report,
        crate::api::report::summary_report,
        crate::api::report::rebuild_summary,
        crate::api::report::clear_report_cache,

        crate::api::cache::status,
        crate::api::cache::refresh,
        crate::api::cache::clear,
        crate::api::cache::sub_sections,
        crate::api::cache::users,
        crate::api::cache::attendance_count,

        crate::api::dashboard::stats,
        crate::api::dashboard::recent_activities,

        crate::api::sync::sync_hris
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            Division,
            CreateDivision,
            Section,
            CreateSection,
            SubSection,
            CreateSubSection,
            TransferredEmployee,
            TransferRequest,
            Employee,
            EmployeeListResponse,
            DivisionReportRow,
            SectionReportRow,
            EmployeeReportRow,
            EmployeePage,
            Pagination,
            DailySummaryRow,
            Meta,
            CacheStatus,
            CacheOverview,
            DashboardStats,
            RecentActivity,
            SyncSummary
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and caller identity"),
        (name = "Organization", description = "Divisions, sections and sub-sections"),
        (name = "Transfers", description = "Employees transferred into sub-sections"),
        (name = "Employees", description = "Employees mirrored from the HRIS"),
        (name = "Reports", description = "Attendance reports"),
        (name = "Cache", description = "In-process dataset cache"),
        (name = "Dashboard", description = "Dashboard counters and activity feed"),
        (name = "Sync", description = "HRIS synchronization"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
