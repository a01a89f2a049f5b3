use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Employee temporarily working under a sub-section. At most one per employee.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TransferredEmployee {
    pub id: u64,
    #[schema(example = "E10023")]
    pub employee_id: String,
    pub employee_name: String,
    pub sub_section_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub transferred_at: NaiveDateTime,
    pub transferred_by: Option<String>,
}
