use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "code": "DIV001",
        "name": "Production",
        "is_active": true,
        "created_at": "2025-12-01T08:00:00",
        "updated_at": "2025-12-01T08:00:00"
    })
)]
pub struct Division {
    pub id: u64,
    /// Unique across all divisions
    pub code: String,
    pub name: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}
