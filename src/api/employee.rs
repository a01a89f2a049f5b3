use crate::{
    error::ApiError,
    model::employee::{EMPLOYEE_COLUMNS, Employee},
    report::{PageRequest, Pagination},
    response,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "divisionCode")]
    pub division_code: Option<String>,
    #[serde(alias = "sectionCode")]
    pub section_code: Option<String>,
    /// Matches employee id or name
    pub search: Option<String>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub records: Vec<Employee>,
    pub pagination: Pagination,
}

struct EmployeeWhere {
    sql: String,
    bindings: Vec<String>,
}

fn build_where(query: &EmployeeQuery) -> EmployeeWhere {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    let text = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    if let Some(division_code) = text(&query.division_code) {
        conditions.push("division_code = ?");
        bindings.push(division_code);
    }
    if let Some(section_code) = text(&query.section_code) {
        conditions.push("section_code = ?");
        bindings.push(section_code);
    }
    if let Some(search) = text(&query.search) {
        conditions.push("(employee_id LIKE ? OR full_name LIKE ?)");
        let like = format!("%{search}%");
        bindings.push(like.clone());
        bindings.push(like);
    }
    match query.is_active {
        Some(true) => conditions.push("is_active = TRUE"),
        Some(false) => conditions.push("is_active = FALSE"),
        None => {}
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    EmployeeWhere { sql, bindings }
}

/// List mirrored employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Employees",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let filter = build_where(&query);

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees_sync {}", filter.sql);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &filter.bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees_sync {} ORDER BY employee_id LIMIT ? OFFSET ?",
        filter.sql
    );
    debug!(sql = %data_sql, bindings = ?filter.bindings, page = page.page, limit = page.limit, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &filter.bindings {
        data_query = data_query.bind(b);
    }
    let records = data_query
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool.get_ref())
        .await?;

    Ok(response::ok(EmployeeListResponse {
        records,
        pagination: Pagination::new(page, total),
    }))
}

/// Get employee by HRIS employee number
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "HRIS employee number")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "success": false,
            "message": "Employee not found"
        }))
    ),
    tag = "Employees",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees_sync WHERE employee_id = ?");

    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(&employee_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(response::ok(employee))
}
