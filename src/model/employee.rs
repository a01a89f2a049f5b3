use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

pub const EMPLOYEE_COLUMNS: &str = "employee_id, full_name, designation, division_code, division_name, \
                                section_code, section_name, is_active, synced_at";

/// Local mirror of an HRIS employee. Division and section fields are
/// snapshots from the last sync and may lag behind the HRIS.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "employee_id": "E10023",
        "full_name": "Nimal Perera",
        "designation": "Machine Operator",
        "division_code": "DIV001",
        "division_name": "Production",
        "section_code": "SEC010",
        "section_name": "Assembly",
        "is_active": true,
        "synced_at": "2026-01-10T02:00:00"
    })
)]
pub struct Employee {
    pub employee_id: String,
    pub full_name: String,
    pub designation: Option<String>,
    pub division_code: Option<String>,
    pub division_name: Option<String>,
    pub section_code: Option<String>,
    pub section_name: Option<String>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub synced_at: NaiveDateTime,
}

/// Active mirrored employees, the "users" dataset of the in-process cache.
pub async fn fetch_active_employees(pool: &MySqlPool) -> Result<Vec<Employee>, sqlx::Error> {
    let sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees_sync WHERE is_active = TRUE ORDER BY employee_id"
    );
    sqlx::query_as::<_, Employee>(&sql).fetch_all(pool).await
}
