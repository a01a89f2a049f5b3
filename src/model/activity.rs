use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RecentActivity {
    pub id: u64,
    #[schema(example = "division.create")]
    pub action: String,
    #[schema(example = "division")]
    pub entity: String,
    pub entity_id: Option<String>,
    pub actor_email: Option<String>,
    pub description: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
