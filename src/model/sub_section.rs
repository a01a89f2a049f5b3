use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SubSection {
    pub id: u64,
    pub section_id: u64,
    pub section_code: String,
    pub section_name: String,
    pub division_id: u64,
    pub division_code: String,
    /// Unique within the parent section
    #[schema(example = "SUB001")]
    pub code: String,
    #[schema(example = "Line A")]
    pub name: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

const SELECT_SUB_SECTIONS: &str = r#"
    SELECT ss.id, ss.section_id, s.code AS section_code, s.name AS section_name,
           s.division_id, d.code AS division_code,
           ss.code, ss.name, ss.is_active, ss.created_at, ss.updated_at
    FROM sub_sections ss
    JOIN sections s ON s.id = ss.section_id
    JOIN divisions d ON d.id = s.division_id
"#;

/// Sub-sections with their parent codes, for one section or all of them.
pub async fn fetch_sub_sections(
    pool: &MySqlPool,
    section_id: Option<u64>,
) -> Result<Vec<SubSection>, sqlx::Error> {
    match section_id {
        Some(section_id) => {
            let sql = format!(
                "{SELECT_SUB_SECTIONS} WHERE ss.section_id = ? ORDER BY d.code, s.code, ss.code"
            );
            sqlx::query_as::<_, SubSection>(&sql)
                .bind(section_id)
                .fetch_all(pool)
                .await
        }
        None => {
            let sql = format!("{SELECT_SUB_SECTIONS} ORDER BY d.code, s.code, ss.code");
            sqlx::query_as::<_, SubSection>(&sql).fetch_all(pool).await
        }
    }
}

pub async fn fetch_sub_section(
    pool: &MySqlPool,
    id: u64,
) -> Result<Option<SubSection>, sqlx::Error> {
    let sql = format!("{SELECT_SUB_SECTIONS} WHERE ss.id = ?");
    sqlx::query_as::<_, SubSection>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}
