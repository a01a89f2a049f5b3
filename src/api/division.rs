use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::division::Division,
    response,
    services::audit::{self, Activity},
    utils::db_utils::{
        Column, build_update_sql, count_children, execute_update, exists, required_text,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const COLUMNS: &[Column] = &[
    Column::Text("code"),
    Column::Text("name"),
    Column::Flag("is_active"),
];

const DUPLICATE: &str = "Division code already exists";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDivision {
    #[schema(example = "DIV001")]
    pub code: String,
    #[schema(example = "Production")]
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DivisionQuery {
    /// Matches code or name
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn fetch_division(pool: &MySqlPool, id: u64) -> Result<Option<Division>, sqlx::Error> {
    sqlx::query_as::<_, Division>(
        r#"
        SELECT id, code, name, is_active, created_at, updated_at
        FROM divisions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// List divisions
#[utoipa::path(
    get,
    path = "/api/divisions",
    params(DivisionQuery),
    responses(
        (status = 200, description = "All divisions ordered by code", body = [Division]),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_divisions(
    pool: web::Data<MySqlPool>,
    query: web::Query<DivisionQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut conditions = Vec::new();
    let mut like = None;

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(code LIKE ? OR name LIKE ?)");
        like = Some(format!("%{search}%"));
    }
    if query.is_active.is_some() {
        conditions.push("is_active = ?");
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "SELECT id, code, name, is_active, created_at, updated_at FROM divisions {where_clause} ORDER BY code"
    );
    debug!(sql = %sql, "Listing divisions");

    let mut q = sqlx::query_as::<_, Division>(&sql);
    if let Some(like) = &like {
        q = q.bind(like).bind(like);
    }
    if let Some(active) = query.is_active {
        q = q.bind(active);
    }

    let divisions = q.fetch_all(pool.get_ref()).await?;
    Ok(response::ok(divisions))
}

/// Get division by id
#[utoipa::path(
    get,
    path = "/api/divisions/{id}",
    params(("id", Path, description = "Division id")),
    responses(
        (status = 200, description = "Division found", body = Division),
        (status = 404, description = "Division not found", body = Object, example = json!({
            "success": false,
            "message": "Division not found"
        }))
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn get_division(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let division = fetch_division(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Division not found"))?;
    Ok(response::ok(division))
}

/// Create division
#[utoipa::path(
    post,
    path = "/api/divisions",
    request_body = CreateDivision,
    responses(
        (status = 201, description = "Division created", body = Division),
        (status = 400, description = "Invalid payload or duplicate code", body = Object, example = json!({
            "success": false,
            "message": "Division code already exists"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_division(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDivision>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let code = required_text(&payload.code, "code")?;
    let name = required_text(&payload.name, "name")?;

    let result = sqlx::query("INSERT INTO divisions (code, name, is_active) VALUES (?, ?, ?)")
        .bind(&code)
        .bind(&name)
        .bind(payload.is_active.unwrap_or(true))
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::from_write(e, DUPLICATE))?;

    let id = result.last_insert_id();
    info!(id, code = %code, "Division created");
    audit::record(
        pool.get_ref(),
        Activity::new("division.create", "division", format!("Created division {code} ({name})"))
            .entity_id(id)
            .by(&auth),
    );

    let division = fetch_division(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("Created division could not be read back".into()))?;
    Ok(response::created(division, "Division created successfully"))
}

/// Update division
#[utoipa::path(
    put,
    path = "/api/divisions/{id}",
    params(("id", Path, description = "Division id")),
    request_body(content = Object, description = "Any of code, name, is_active", example = json!({
        "name": "Production Floor"
    })),
    responses(
        (status = 200, description = "Division updated", body = Division),
        (status = 400, description = "Invalid field or duplicate code"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Division not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_division(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let update = build_update_sql("divisions", &body, COLUMNS, id)?;

    if !exists(pool.get_ref(), "divisions", id).await? {
        return Err(ApiError::not_found("Division not found"));
    }

    execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| ApiError::from_write(e, DUPLICATE))?;

    audit::record(
        pool.get_ref(),
        Activity::new("division.update", "division", format!("Updated division {id}: {body}"))
            .entity_id(id)
            .by(&auth),
    );

    let division = fetch_division(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Division not found"))?;
    Ok(response::with_message(division, "Division updated successfully"))
}

/// Delete division
#[utoipa::path(
    delete,
    path = "/api/divisions/{id}",
    params(("id", Path, description = "Division id")),
    responses(
        (status = 200, description = "Division deleted"),
        (status = 400, description = "Division still has sections"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Division not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_division(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = path.into_inner();

    let division = fetch_division(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Division not found"))?;

    if count_children(pool.get_ref(), "sections", "division_id", id).await? > 0 {
        return Err(ApiError::validation(
            "Division still has sections, remove them first",
        ));
    }

    sqlx::query("DELETE FROM divisions WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(id, code = %division.code, "Division deleted");
    audit::record(
        pool.get_ref(),
        Activity::new(
            "division.delete",
            "division",
            format!("Deleted division {}", division.code),
        )
        .entity_id(id)
        .by(&auth),
    );

    Ok(response::with_message(json!({ "id": id }), "Division deleted successfully"))
}

#[cfg(test)]
mod tests {
    use crate::model::role::Role;
    use crate::test_support::{TestApp, anonymous, authed, json_of, live_pool};
    use actix_web::{
        http::StatusCode,
        test::{self, TestRequest},
    };
    use serde_json::json;

    #[actix_web::test]
    async fn clerks_cannot_create_divisions() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::post().uri("/api/divisions"), Role::Clerk)
            .set_json(json!({"code": "DIV009", "name": "Logistics"}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"success": false, "message": "Admin only"}));
    }

    #[actix_web::test]
    async fn blank_code_is_rejected_before_touching_the_database() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::post().uri("/api/divisions"), Role::Admin)
            .set_json(json!({"code": "  ", "name": "Logistics"}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "code is required");
    }

    #[actix_web::test]
    async fn malformed_body_gets_the_error_envelope() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::post().uri("/api/divisions"), Role::Admin)
            .set_json(json!({"name": "No code"}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("code"));
    }

    #[actix_web::test]
    async fn update_refuses_unknown_columns() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::put().uri("/api/divisions/3"), Role::SuperAdmin)
            .set_json(json!({"created_at": "2020-01-01"}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Field 'created_at' cannot be updated");
    }

    #[actix_web::test]
    async fn listing_requires_authentication() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = anonymous(TestRequest::get().uri("/api/divisions"));
        let resp = test::call_service(&svc, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn database_outage_is_a_generic_500() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::get().uri("/api/divisions/1"), Role::Clerk);
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Something went wrong, Contact with system admin");
    }

    #[actix_web::test]
    #[ignore = "needs DATABASE_URL pointing at a MySQL 8 server"]
    async fn second_create_with_same_code_is_rejected_without_overwrite() {
        let pool = live_pool().await;
        let app = TestApp::default();
        let svc = test::init_service(app.build_on(pool.clone())).await;
        let code = format!("DUP-{}", &uuid::Uuid::new_v4().to_string()[..8]);

        let req = authed(TestRequest::post().uri("/api/divisions"), Role::Admin)
            .set_json(json!({"code": code, "name": "Original"}));
        let (status, first) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["data"]["code"], code.as_str());

        let req = authed(TestRequest::post().uri("/api/divisions"), Role::Admin)
            .set_json(json!({"code": code, "name": "Overwrite attempt"}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"success": false, "message": "Division code already exists"})
        );

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM divisions WHERE code = ?")
            .bind(&code)
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(names, vec!["Original".to_string()]);
    }
}
