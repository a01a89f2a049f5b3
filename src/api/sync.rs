use crate::{
    auth::auth::AuthUser,
    cache::{DatasetCache, warmup_dataset_cache},
    error::ApiError,
    hris::HrisClient,
    report::ReportService,
    response,
    services::{
        audit::{self, Activity},
        sync::{SyncSummary, sync_from_hris},
    },
};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;
use tracing::info;

/// Mirror divisions, sections and employees from the HRIS
#[utoipa::path(
    post,
    path = "/api/sync/hris",
    responses(
        (status = 200, description = "Per-collection counts", body = SyncSummary),
        (status = 403, description = "Admin only"),
        (status = 500, description = "HRIS or database failure", body = Object, example = json!({
            "success": false,
            "message": "HRIS request failed: HRIS rejected the token twice"
        }))
    ),
    tag = "Sync",
    security(("bearer_auth" = []))
)]
pub async fn sync_hris(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hris: web::Data<HrisClient>,
    datasets: web::Data<DatasetCache>,
    reports: web::Data<ReportService>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let summary = sync_from_hris(&hris, pool.get_ref()).await?;

    // mirrored data changed underneath both caches
    datasets.clear().await;
    let invalidated = reports.invalidate().await;
    info!(invalidated, "Caches dropped after HRIS sync");

    let datasets = datasets.into_inner();
    actix_web::rt::spawn(async move {
        warmup_dataset_cache(&datasets).await;
    });

    audit::record(
        pool.get_ref(),
        Activity::new(
            "hris.sync",
            "employee",
            format!(
                "HRIS sync: {} divisions, {} sections, {} employees",
                summary.divisions, summary.sections, summary.employees
            ),
        )
        .by(&auth),
    );

    Ok(response::with_message(summary, "HRIS sync completed"))
}
