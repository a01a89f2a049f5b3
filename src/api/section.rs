use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::section::Section,
    response,
    services::audit::{self, Activity},
    utils::db_utils::{
        Column, build_update_sql, count_children, execute_update, exists, patched_id,
        required_text,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const COLUMNS: &[Column] = &[
    Column::Id("division_id"),
    Column::Text("code"),
    Column::Text("name"),
    Column::Flag("is_active"),
];

const DUPLICATE: &str = "Section code already exists in this division";

const SELECT_SECTIONS: &str = r#"
    SELECT s.id, s.division_id, d.code AS division_code, d.name AS division_name,
           s.code, s.name, s.is_active, s.created_at, s.updated_at
    FROM sections s
    JOIN divisions d ON d.id = s.division_id
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSection {
    #[schema(example = 1)]
    pub division_id: u64,
    #[schema(example = "SEC010")]
    pub code: String,
    #[schema(example = "Assembly")]
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SectionQuery {
    #[serde(alias = "divisionId")]
    pub division_id: Option<u64>,
}

pub async fn fetch_section(pool: &MySqlPool, id: u64) -> Result<Option<Section>, sqlx::Error> {
    let sql = format!("{SELECT_SECTIONS} WHERE s.id = ?");
    sqlx::query_as::<_, Section>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List sections, optionally for one division
#[utoipa::path(
    get,
    path = "/api/sections",
    params(SectionQuery),
    responses((status = 200, description = "Sections ordered by division and code", body = [Section])),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_sections(
    pool: web::Data<MySqlPool>,
    query: web::Query<SectionQuery>,
) -> Result<HttpResponse, ApiError> {
    let sections = match query.division_id {
        Some(division_id) => {
            let sql = format!("{SELECT_SECTIONS} WHERE s.division_id = ? ORDER BY d.code, s.code");
            sqlx::query_as::<_, Section>(&sql)
                .bind(division_id)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            let sql = format!("{SELECT_SECTIONS} ORDER BY d.code, s.code");
            sqlx::query_as::<_, Section>(&sql)
                .fetch_all(pool.get_ref())
                .await?
        }
    };
    Ok(response::ok(sections))
}

/// Get section by id
#[utoipa::path(
    get,
    path = "/api/sections/{id}",
    params(("id", Path, description = "Section id")),
    responses(
        (status = 200, description = "Section found", body = Section),
        (status = 404, description = "Section not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn get_section(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let section = fetch_section(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Section not found"))?;
    Ok(response::ok(section))
}

/// Create section under a division
#[utoipa::path(
    post,
    path = "/api/sections",
    request_body = CreateSection,
    responses(
        (status = 201, description = "Section created", body = Section),
        (status = 400, description = "Invalid payload or duplicate code"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Division not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_section(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSection>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let code = required_text(&payload.code, "code")?;
    let name = required_text(&payload.name, "name")?;

    if !exists(pool.get_ref(), "divisions", payload.division_id).await? {
        return Err(ApiError::not_found("Division not found"));
    }

    let result = sqlx::query(
        "INSERT INTO sections (division_id, code, name, is_active) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.division_id)
    .bind(&code)
    .bind(&name)
    .bind(payload.is_active.unwrap_or(true))
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::from_write(e, DUPLICATE))?;

    let id = result.last_insert_id();
    info!(id, division_id = payload.division_id, code = %code, "Section created");
    audit::record(
        pool.get_ref(),
        Activity::new("section.create", "section", format!("Created section {code} ({name})"))
            .entity_id(id)
            .by(&auth),
    );

    let section = fetch_section(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("Created section could not be read back".into()))?;
    Ok(response::created(section, "Section created successfully"))
}

/// Update section
#[utoipa::path(
    put,
    path = "/api/sections/{id}",
    params(("id", Path, description = "Section id")),
    request_body(content = Object, description = "Any of division_id, code, name, is_active"),
    responses(
        (status = 200, description = "Section updated", body = Section),
        (status = 400, description = "Invalid field or duplicate code"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Section or division not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_section(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let update = build_update_sql("sections", &body, COLUMNS, id)?;

    if !exists(pool.get_ref(), "sections", id).await? {
        return Err(ApiError::not_found("Section not found"));
    }
    if let Some(division_id) = patched_id(&body, "division_id") {
        if !exists(pool.get_ref(), "divisions", division_id).await? {
            return Err(ApiError::not_found("Division not found"));
        }
    }

    execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| ApiError::from_write(e, DUPLICATE))?;

    audit::record(
        pool.get_ref(),
        Activity::new("section.update", "section", format!("Updated section {id}: {body}"))
            .entity_id(id)
            .by(&auth),
    );

    let section = fetch_section(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Section not found"))?;
    Ok(response::with_message(section, "Section updated successfully"))
}

/// Delete section
#[utoipa::path(
    delete,
    path = "/api/sections/{id}",
    params(("id", Path, description = "Section id")),
    responses(
        (status = 200, description = "Section deleted"),
        (status = 400, description = "Section still has sub-sections"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Section not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_section(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = path.into_inner();

    let section = fetch_section(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Section not found"))?;

    if count_children(pool.get_ref(), "sub_sections", "section_id", id).await? > 0 {
        return Err(ApiError::validation(
            "Section still has sub-sections, remove them first",
        ));
    }

    sqlx::query("DELETE FROM sections WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(id, code = %section.code, "Section deleted");
    audit::record(
        pool.get_ref(),
        Activity::new(
            "section.delete",
            "section",
            format!("Deleted section {} of {}", section.code, section.division_code),
        )
        .entity_id(id)
        .by(&auth),
    );

    Ok(response::with_message(json!({ "id": id }), "Section deleted successfully"))
}
