use crate::{
    auth::auth::AuthUser,
    cache::{CacheStatus, DatasetCache},
    error::ApiError,
    model::{employee::Employee, sub_section::SubSection},
    report::ReportService,
    response::{self, Meta},
};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheOverview {
    pub datasets: CacheStatus,
    /// False when Redis was unreachable at startup
    pub report_cache_enabled: bool,
}

fn ensure_ready(datasets: &DatasetCache) -> Result<(), ApiError> {
    if datasets.is_ready() {
        Ok(())
    } else {
        Err(ApiError::NotReady(
            "Cache is not ready yet, please retry shortly".to_string(),
        ))
    }
}

/// Dataset cache and report cache state
#[utoipa::path(
    get,
    path = "/api/cache/status",
    responses((status = 200, description = "Cache state", body = CacheOverview)),
    tag = "Cache",
    security(("bearer_auth" = []))
)]
pub async fn status(
    datasets: web::Data<DatasetCache>,
    reports: web::Data<ReportService>,
) -> Result<HttpResponse, ApiError> {
    Ok(response::ok(CacheOverview {
        datasets: datasets.status().await,
        report_cache_enabled: reports.cache_enabled(),
    }))
}

/// Reload every dataset from MySQL
#[utoipa::path(
    post,
    path = "/api/cache/refresh",
    responses(
        (status = 200, description = "Datasets reloaded", body = CacheStatus),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Reload failed, cache left not ready")
    ),
    tag = "Cache",
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    auth: AuthUser,
    datasets: web::Data<DatasetCache>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    datasets.initialize().await?;
    info!(by = %auth.email, "Dataset cache refreshed");
    Ok(response::with_message(datasets.status().await, "Cache refreshed"))
}

/// Drop every dataset and mark the cache not ready
#[utoipa::path(
    delete,
    path = "/api/cache",
    responses(
        (status = 200, description = "Cache cleared"),
        (status = 403, description = "Admin only")
    ),
    tag = "Cache",
    security(("bearer_auth" = []))
)]
pub async fn clear(
    auth: AuthUser,
    datasets: web::Data<DatasetCache>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    datasets.clear().await;
    Ok(response::with_message(json!({ "ready": false }), "Cache cleared"))
}

/// Cached sub-sections
#[utoipa::path(
    get,
    path = "/api/cache/subsections",
    responses(
        (status = 200, description = "Sub-sections from cache", body = [SubSection]),
        (status = 503, description = "Cache not ready", body = Object, example = json!({
            "success": false,
            "message": "Cache is not ready yet, please retry shortly"
        }))
    ),
    tag = "Cache",
    security(("bearer_auth" = []))
)]
pub async fn sub_sections(datasets: web::Data<DatasetCache>) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    ensure_ready(&datasets)?;

    let rows = datasets.sub_sections().await?;
    let meta = Meta::new(started.elapsed(), started, rows.value.len(), rows.hit);
    Ok(response::with_meta(rows.value.as_slice(), meta))
}

/// Cached active employees
#[utoipa::path(
    get,
    path = "/api/cache/users",
    responses(
        (status = 200, description = "Employees from cache", body = [Employee]),
        (status = 503, description = "Cache not ready")
    ),
    tag = "Cache",
    security(("bearer_auth" = []))
)]
pub async fn users(datasets: web::Data<DatasetCache>) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    ensure_ready(&datasets)?;

    let rows = datasets.users().await?;
    let meta = Meta::new(started.elapsed(), started, rows.value.len(), rows.hit);
    Ok(response::with_meta(rows.value.as_slice(), meta))
}

/// Cached attendance row count
#[utoipa::path(
    get,
    path = "/api/cache/attendance-count",
    responses(
        (status = 200, description = "Attendance record count", body = Object, example = json!({
            "success": true,
            "data": { "count": 4210 }
        })),
        (status = 503, description = "Cache not ready")
    ),
    tag = "Cache",
    security(("bearer_auth" = []))
)]
pub async fn attendance_count(
    datasets: web::Data<DatasetCache>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    ensure_ready(&datasets)?;

    let count = datasets.attendance_count().await?;
    let meta = Meta::new(started.elapsed(), started, 1, count.hit);
    Ok(response::with_meta(json!({ "count": count.value }), meta))
}

#[cfg(test)]
mod tests {
    use crate::cache::dataset::SUB_SECTIONS_KEY;
    use crate::model::role::Role;
    use crate::test_support::{TestApp, authed, json_of};
    use actix_web::{
        http::StatusCode,
        test::{self, TestRequest},
    };
    use std::sync::atomic::Ordering;

    #[actix_web::test]
    async fn datasets_are_unavailable_until_initialized() {
        let app = TestApp::default();
        let svc = test::init_service(app.build()).await;

        let req = authed(TestRequest::get().uri("/api/cache/subsections"), Role::Clerk);
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);

        app.datasets.initialize().await.unwrap();

        let req = authed(TestRequest::get().uri("/api/cache/subsections"), Role::Clerk);
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["meta"]["cached"], true);
        assert_eq!(app.source.sub_section_loads.load(Ordering::SeqCst), 1);

        let req = authed(TestRequest::get().uri("/api/cache/attendance-count"), Role::Clerk);
        let (_, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(body["data"]["count"], 4210);
    }

    #[actix_web::test]
    async fn meta_reports_a_reload_after_expiry_as_not_cached() {
        let app = TestApp::default();
        let svc = test::init_service(app.build()).await;
        app.datasets.initialize().await.unwrap();
        app.datasets.invalidate(SUB_SECTIONS_KEY).await;

        let req = authed(TestRequest::get().uri("/api/cache/subsections"), Role::Clerk);
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["cached"], false);
        assert_eq!(app.source.sub_section_loads.load(Ordering::SeqCst), 2);

        let req = authed(TestRequest::get().uri("/api/cache/subsections"), Role::Clerk);
        let (_, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(body["meta"]["cached"], true);
        assert_eq!(app.source.sub_section_loads.load(Ordering::SeqCst), 2);

        let req = authed(TestRequest::get().uri("/api/cache/attendance-count"), Role::Clerk);
        let (_, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(body["meta"]["cached"], true);
    }

    #[actix_web::test]
    async fn refresh_and_clear_flip_the_ready_flag() {
        let app = TestApp::default();
        let svc = test::init_service(app.build()).await;

        let req = authed(TestRequest::post().uri("/api/cache/refresh"), Role::Clerk);
        let resp = test::call_service(&svc, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(!app.datasets.is_ready());

        let req = authed(TestRequest::post().uri("/api/cache/refresh"), Role::Admin);
        let (status, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["ready"], true);
        assert_eq!(body["data"]["entries"], 3);

        let req = authed(TestRequest::delete().uri("/api/cache"), Role::Admin);
        let resp = test::call_service(&svc, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!app.datasets.is_ready());

        let req = authed(TestRequest::get().uri("/api/cache/status"), Role::Clerk);
        let (_, body) = json_of(test::call_service(&svc, req.to_request()).await).await;
        assert_eq!(body["data"]["datasets"]["ready"], false);
        assert_eq!(body["data"]["report_cache_enabled"], true);
    }
}
