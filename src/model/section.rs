use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Section {
    pub id: u64,
    pub division_id: u64,
    #[schema(example = "DIV001")]
    pub division_code: String,
    #[schema(example = "Production")]
    pub division_name: String,
    /// Unique within the parent division
    #[schema(example = "SEC010")]
    pub code: String,
    #[schema(example = "Assembly")]
    pub name: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}
