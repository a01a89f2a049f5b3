use crate::error::ApiError;
use serde_json::Value;
use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Bool(bool),
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Column that may be patched, and how its JSON value must look.
#[derive(Debug, Clone, Copy)]
pub enum Column {
    Text(&'static str),
    Flag(&'static str),
    Id(&'static str),
}

impl Column {
    fn name(&self) -> &'static str {
        match self {
            Column::Text(n) | Column::Flag(n) | Column::Id(n) => n,
        }
    }
}

/// ===============================
/// Build a partial UPDATE from a JSON object, only for whitelisted columns
/// ===============================
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    columns: &[Column],
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::validation("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = columns
            .iter()
            .find(|c| c.name() == key.as_str())
            .ok_or_else(|| ApiError::validation(format!("Field '{key}' cannot be updated")))?;

        let bound = match (column, value) {
            (Column::Text(_), Value::String(s)) if !s.trim().is_empty() => {
                SqlValue::String(s.trim().to_string())
            }
            (Column::Flag(_), Value::Bool(b)) => SqlValue::Bool(*b),
            (Column::Id(_), Value::Number(n)) if n.as_u64().is_some() => {
                SqlValue::U64(n.as_u64().unwrap_or_default())
            }
            _ => {
                return Err(ApiError::validation(format!(
                    "Field '{key}' has an invalid value"
                )));
            }
        };

        assignments.push(format!("{} = ?", column.name()));
        values.push(bound);
    }

    let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments.join(", "));

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Trimmed, non-empty text for a required create field.
pub fn required_text(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// ===============================
/// Row lookups shared by the org controllers
/// ===============================
pub async fn exists(pool: &MySqlPool, table: &str, id: u64) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE id = ?");
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn count_children(
    pool: &MySqlPool,
    table: &str,
    parent_column: &str,
    parent_id: u64,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {parent_column} = ?");
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(parent_id)
        .fetch_one(pool)
        .await
}

/// Id of a column patch, when the payload changes that column.
pub fn patched_id(payload: &Value, column: &str) -> Option<u64> {
    payload.get(column).and_then(Value::as_u64)
}
