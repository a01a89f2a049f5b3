use actix_web::HttpResponse;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

/// Timing and provenance attached to every report response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Milliseconds spent in the query (or cache lookup)
    #[schema(example = 12.4)]
    pub query_time: f64,
    /// Milliseconds spent in the whole handler
    #[schema(example = 13.1)]
    pub total_time: f64,
    #[schema(example = 8)]
    pub record_count: usize,
    pub cached: bool,
    #[schema(example = "2026-01-10T08:00:00.000Z")]
    pub timestamp: String,
}

impl Meta {
    pub fn new(query_time: Duration, started: Instant, record_count: usize, cached: bool) -> Self {
        Self {
            query_time: millis(query_time),
            total_time: millis(started.elapsed()),
            record_count,
            cached,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        data,
        meta: None,
        message: None,
    })
}

pub fn created<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Created().json(Envelope {
        success: true,
        data,
        meta: None,
        message: Some(message.to_string()),
    })
}

pub fn with_message<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        data,
        meta: None,
        message: Some(message.to_string()),
    })
}

pub fn with_meta<T: Serialize>(data: T, meta: Meta) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        data,
        meta: Some(meta),
        message: None,
    })
}

fn millis(d: Duration) -> f64 {
    (d.as_secs_f64() * 100_000.0).round() / 100.0
}
