use crate::{
    auth::auth::AuthUser,
    cache::{DatasetCache, dataset::SUB_SECTIONS_KEY},
    error::ApiError,
    model::sub_section::{SubSection, fetch_sub_section, fetch_sub_sections},
    response,
    services::audit::{self, Activity},
    utils::db_utils::{
        Column, build_update_sql, execute_update, exists, patched_id, required_text,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const COLUMNS: &[Column] = &[
    Column::Id("section_id"),
    Column::Text("code"),
    Column::Text("name"),
    Column::Flag("is_active"),
];

const DUPLICATE: &str = "Sub-section code already exists in this section";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSubSection {
    #[schema(example = 10)]
    pub section_id: u64,
    #[schema(example = "SUB001")]
    pub code: String,
    #[schema(example = "Line A")]
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubSectionQuery {
    #[serde(alias = "sectionId")]
    pub section_id: Option<u64>,
}

/// List sub-sections, optionally for one section
#[utoipa::path(
    get,
    path = "/api/subsections",
    params(SubSectionQuery),
    responses((status = 200, description = "Sub-sections with parent codes", body = [SubSection])),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_sub_sections(
    pool: web::Data<MySqlPool>,
    query: web::Query<SubSectionQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = fetch_sub_sections(pool.get_ref(), query.section_id).await?;
    Ok(response::ok(rows))
}

/// Get sub-section by id
#[utoipa::path(
    get,
    path = "/api/subsections/{id}",
    params(("id", Path, description = "Sub-section id")),
    responses(
        (status = 200, description = "Sub-section found", body = SubSection),
        (status = 404, description = "Sub-section not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn get_sub_section(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let row = fetch_sub_section(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Sub-section not found"))?;
    Ok(response::ok(row))
}

/// Create sub-section under a section
#[utoipa::path(
    post,
    path = "/api/subsections",
    request_body = CreateSubSection,
    responses(
        (status = 201, description = "Sub-section created", body = SubSection),
        (status = 400, description = "Invalid payload or duplicate code", body = Object, example = json!({
            "success": false,
            "message": "Sub-section code already exists in this section"
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Section not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_sub_section(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    datasets: web::Data<DatasetCache>,
    payload: web::Json<CreateSubSection>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let code = required_text(&payload.code, "code")?;
    let name = required_text(&payload.name, "name")?;

    if !exists(pool.get_ref(), "sections", payload.section_id).await? {
        return Err(ApiError::not_found("Section not found"));
    }

    let result = sqlx::query(
        "INSERT INTO sub_sections (section_id, code, name, is_active) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.section_id)
    .bind(&code)
    .bind(&name)
    .bind(payload.is_active.unwrap_or(true))
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::from_write(e, DUPLICATE))?;

    let id = result.last_insert_id();
    datasets.invalidate(SUB_SECTIONS_KEY).await;
    info!(id, section_id = payload.section_id, code = %code, "Sub-section created");
    audit::record(
        pool.get_ref(),
        Activity::new(
            "subsection.create",
            "sub_section",
            format!("Created sub-section {code} ({name})"),
        )
        .entity_id(id)
        .by(&auth),
    );

    let row = fetch_sub_section(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("Created sub-section could not be read back".into()))?;
    Ok(response::created(row, "Sub-section created successfully"))
}

/// Update sub-section
#[utoipa::path(
    put,
    path = "/api/subsections/{id}",
    params(("id", Path, description = "Sub-section id")),
    request_body(content = Object, description = "Any of section_id, code, name, is_active"),
    responses(
        (status = 200, description = "Sub-section updated", body = SubSection),
        (status = 400, description = "Invalid field or duplicate code"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Sub-section or section not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_sub_section(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    datasets: web::Data<DatasetCache>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let update = build_update_sql("sub_sections", &body, COLUMNS, id)?;

    if !exists(pool.get_ref(), "sub_sections", id).await? {
        return Err(ApiError::not_found("Sub-section not found"));
    }
    if let Some(section_id) = patched_id(&body, "section_id") {
        if !exists(pool.get_ref(), "sections", section_id).await? {
            return Err(ApiError::not_found("Section not found"));
        }
    }

    execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| ApiError::from_write(e, DUPLICATE))?;
    datasets.invalidate(SUB_SECTIONS_KEY).await;

    audit::record(
        pool.get_ref(),
        Activity::new(
            "subsection.update",
            "sub_section",
            format!("Updated sub-section {id}: {body}"),
        )
        .entity_id(id)
        .by(&auth),
    );

    let row = fetch_sub_section(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sub-section not found"))?;
    Ok(response::with_message(row, "Sub-section updated successfully"))
}

/// Delete sub-section; its transfers go with it
#[utoipa::path(
    delete,
    path = "/api/subsections/{id}",
    params(("id", Path, description = "Sub-section id")),
    responses(
        (status = 200, description = "Sub-section deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Sub-section not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_sub_section(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    datasets: web::Data<DatasetCache>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = path.into_inner();

    let row = fetch_sub_section(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sub-section not found"))?;

    sqlx::query("DELETE FROM sub_sections WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    datasets.invalidate(SUB_SECTIONS_KEY).await;

    info!(id, code = %row.code, "Sub-section deleted");
    audit::record(
        pool.get_ref(),
        Activity::new(
            "subsection.delete",
            "sub_section",
            format!("Deleted sub-section {} of {}", row.code, row.section_code),
        )
        .entity_id(id)
        .by(&auth),
    );

    Ok(response::with_message(json!({ "id": id }), "Sub-section deleted successfully"))
}

#[cfg(test)]
mod tests {
    use crate::model::role::Role;
    use crate::test_support::{TestApp, authed, json_of};
    use actix_web::{
        http::StatusCode,
        test::{self, TestRequest},
    };
    use serde_json::json;

    #[actix_web::test]
    async fn create_is_admin_only() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::post().uri("/api/subsections"), Role::Clerk)
            .set_json(json!({"section_id": 10, "code": "SUB001", "name": "Line A"}));
        let resp = test::call_service(&svc, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn empty_patch_is_rejected() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::put().uri("/api/subsections/2"), Role::Admin)
            .set_json(json!({}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No fields provided for update");
    }
}
