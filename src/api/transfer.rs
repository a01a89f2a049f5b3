use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::transfer::TransferredEmployee,
    response,
    services::audit::{self, Activity},
    utils::db_utils::{exists, required_text},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    #[serde(alias = "employeeId")]
    #[schema(example = "E10023")]
    pub employee_id: String,
    #[serde(alias = "employeeName")]
    #[schema(example = "Nimal Perera")]
    pub employee_name: String,
}

const SELECT_TRANSFERS: &str = r#"
    SELECT id, employee_id, employee_name, sub_section_id, transferred_at, transferred_by
    FROM transferred_employees
"#;

/// Transfer an employee into a sub-section
#[utoipa::path(
    post,
    path = "/api/subsections/{id}/transfers",
    params(("id", Path, description = "Target sub-section id")),
    request_body = TransferRequest,
    responses(
        (status = 201, description = "Employee transferred", body = TransferredEmployee),
        (status = 400, description = "Employee already transferred", body = Object, example = json!({
            "success": false,
            "message": "Employee is already transferred to a sub-section"
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Sub-section not found")
    ),
    tag = "Transfers",
    security(("bearer_auth" = []))
)]
pub async fn transfer_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TransferRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let sub_section_id = path.into_inner();
    let employee_id = required_text(&payload.employee_id, "employee_id")?;
    let employee_name = required_text(&payload.employee_name, "employee_name")?;

    if !exists(pool.get_ref(), "sub_sections", sub_section_id).await? {
        return Err(ApiError::not_found("Sub-section not found"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO transferred_employees (employee_id, employee_name, sub_section_id, transferred_by)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&employee_id)
    .bind(&employee_name)
    .bind(sub_section_id)
    .bind(&auth.email)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::from_write(e, "Employee is already transferred to a sub-section"))?;

    info!(employee_id = %employee_id, sub_section_id, "Employee transferred");
    audit::record(
        pool.get_ref(),
        Activity::new(
            "transfer.create",
            "transferred_employee",
            format!("Transferred {employee_name} ({employee_id}) to sub-section {sub_section_id}"),
        )
        .entity_id(&employee_id)
        .by(&auth),
    );

    let sql = format!("{SELECT_TRANSFERS} WHERE id = ?");
    let transfer = sqlx::query_as::<_, TransferredEmployee>(&sql)
        .bind(result.last_insert_id())
        .fetch_one(pool.get_ref())
        .await?;
    Ok(response::created(transfer, "Employee transferred successfully"))
}

/// Employees currently transferred into a sub-section
#[utoipa::path(
    get,
    path = "/api/subsections/{id}/transfers",
    params(("id", Path, description = "Sub-section id")),
    responses(
        (status = 200, description = "Transferred employees", body = [TransferredEmployee]),
        (status = 404, description = "Sub-section not found")
    ),
    tag = "Transfers",
    security(("bearer_auth" = []))
)]
pub async fn list_transfers(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let sub_section_id = path.into_inner();
    if !exists(pool.get_ref(), "sub_sections", sub_section_id).await? {
        return Err(ApiError::not_found("Sub-section not found"));
    }

    let sql = format!("{SELECT_TRANSFERS} WHERE sub_section_id = ? ORDER BY transferred_at DESC");
    let rows = sqlx::query_as::<_, TransferredEmployee>(&sql)
        .bind(sub_section_id)
        .fetch_all(pool.get_ref())
        .await?;
    Ok(response::ok(rows))
}

/// Recall a transferred employee
#[utoipa::path(
    delete,
    path = "/api/subsections/transfers/{employee_id}",
    params(("employee_id", Path, description = "HRIS employee number")),
    responses(
        (status = 200, description = "Transfer removed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No transfer for this employee")
    ),
    tag = "Transfers",
    security(("bearer_auth" = []))
)]
pub async fn recall_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM transferred_employees WHERE employee_id = ?")
        .bind(&employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Transfer not found"));
    }

    info!(employee_id = %employee_id, "Employee recalled");
    audit::record(
        pool.get_ref(),
        Activity::new(
            "transfer.recall",
            "transferred_employee",
            format!("Recalled {employee_id} from transfer"),
        )
        .entity_id(&employee_id)
        .by(&auth),
    );

    Ok(response::with_message(
        json!({ "employee_id": employee_id }),
        "Employee recalled successfully",
    ))
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
    async fn employee_id_is_required() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(TestRequest::post().uri("/api/subsections/3/transfers"), Role::Admin)
            .set_json(json!({"employeeId": " ", "employeeName": "Nimal Perera"}));
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "employee_id is required");
    }

    #[actix_web::test]
    async fn recall_is_admin_only() {
        let svc = test::init_service(TestApp::default().build()).await;

        let req = authed(
            TestRequest::delete().uri("/api/subsections/transfers/E10023"),
            Role::Clerk,
        );
        let resp = test::call_service(&svc, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
