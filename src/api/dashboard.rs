use crate::{error::ApiError, model::activity::RecentActivity, response};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub divisions: i64,
    pub sections: i64,
    pub sub_sections: i64,
    pub active_employees: i64,
    pub transferred_employees: i64,
    /// Distinct employees with a present scan today
    pub present_today: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// 1..=100, default 10
    pub limit: Option<u32>,
}

impl ActivityQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}

async fn count(pool: &MySqlPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

/// Headline counts
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses((status = 200, description = "Dashboard counters", body = DashboardStats)),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn stats(pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let pool = pool.get_ref();

    let (divisions, sections, sub_sections, active_employees, transferred_employees, present_today) =
        futures::try_join!(
            count(pool, "SELECT COUNT(*) FROM divisions"),
            count(pool, "SELECT COUNT(*) FROM sections"),
            count(pool, "SELECT COUNT(*) FROM sub_sections"),
            count(pool, "SELECT COUNT(*) FROM employees_sync WHERE is_active = TRUE"),
            count(pool, "SELECT COUNT(*) FROM transferred_employees"),
            count(
                pool,
                "SELECT COUNT(DISTINCT employee_id) FROM attendance_reports_optimized \
                 WHERE attendance_date = CURDATE() AND is_present = TRUE",
            ),
        )?;

    Ok(response::ok(DashboardStats {
        divisions,
        sections,
        sub_sections,
        active_employees,
        transferred_employees,
        present_today,
    }))
}

/// Latest audit entries, newest first
#[utoipa::path(
    get,
    path = "/api/dashboard/recent-activities",
    params(ActivityQuery),
    responses((status = 200, description = "Recent activities", body = [RecentActivity])),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn recent_activities(
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, RecentActivity>(
        r#"
        SELECT id, action, entity, entity_id, actor_email, description, created_at
        FROM recent_activities
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(query.limit())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(response::ok(rows))
}
