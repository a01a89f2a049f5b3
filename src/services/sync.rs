//! Pulls divisions, sections and employees from the HRIS and mirrors them
//! into the `*_sync` tables.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use sqlx::MySqlPool;
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::hris::{HrisClient, HrisError};

pub const DIVISION_COLLECTION: &str = "division";
pub const SECTION_COLLECTION: &str = "section";
pub const EMPLOYEE_COLLECTION: &str = "employee";

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected a code, got {other}"))),
    }
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts booleans, 0/1 and "ACTIVE"/"INACTIVE" style flags.
fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_i64().map(|v| v != 0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "active" | "true" | "1" | "yes" => Some(true),
            "inactive" | "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HrisDivision {
    #[serde(alias = "DIVISION_CODE", alias = "division_code", alias = "divisionCode", deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(alias = "DIVISION_NAME", alias = "division_name", alias = "divisionName", deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HrisSection {
    #[serde(alias = "DIVISION_CODE", alias = "divisionCode", deserialize_with = "lenient_string")]
    pub division_code: String,
    #[serde(alias = "SECTION_CODE", alias = "section_code", alias = "sectionCode", deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(alias = "SECTION_NAME", alias = "section_name", alias = "sectionName", deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HrisEmployee {
    #[serde(alias = "EMP_NUMBER", alias = "employeeId", alias = "emp_no", deserialize_with = "lenient_string")]
    pub employee_id: String,
    #[serde(alias = "FULLNAME", alias = "fullName", alias = "name", deserialize_with = "lenient_string")]
    pub full_name: String,
    #[serde(default, alias = "DESIGNATION", deserialize_with = "lenient_opt_string")]
    pub designation: Option<String>,
    #[serde(default, alias = "DIVISION_CODE", alias = "divisionCode", deserialize_with = "lenient_opt_string")]
    pub division_code: Option<String>,
    #[serde(default, alias = "DIVISION_NAME", alias = "divisionName", deserialize_with = "lenient_opt_string")]
    pub division_name: Option<String>,
    #[serde(default, alias = "SECTION_CODE", alias = "sectionCode", deserialize_with = "lenient_opt_string")]
    pub section_code: Option<String>,
    #[serde(default, alias = "SECTION_NAME", alias = "sectionName", deserialize_with = "lenient_opt_string")]
    pub section_name: Option<String>,
    #[serde(default, alias = "ACTIVE_HRM_FLG", alias = "status", alias = "isActive", deserialize_with = "lenient_flag")]
    pub is_active: Option<bool>,
}

/// Documents that don't parse are dropped with a warning and counted.
fn parse_documents<T: for<'de> Deserialize<'de>>(collection: &str, docs: Vec<Value>) -> (Vec<T>, u64) {
    let mut parsed = Vec::with_capacity(docs.len());
    let mut skipped = 0;
    for doc in docs {
        match serde_json::from_value::<T>(doc) {
            Ok(row) => parsed.push(row),
            Err(e) => {
                skipped += 1;
                warn!(collection, error = %e, "Skipping unreadable HRIS document");
            }
        }
    }
    (parsed, skipped)
}

#[derive(Debug, Default)]
pub struct HrisSnapshot {
    pub divisions: Vec<HrisDivision>,
    pub sections: Vec<HrisSection>,
    pub employees: Vec<HrisEmployee>,
    pub skipped: u64,
}

/// Reads the three collections one after another so they share one login.
pub async fn fetch_snapshot(hris: &HrisClient) -> Result<HrisSnapshot, HrisError> {
    let (divisions, skipped_divisions) =
        parse_documents(DIVISION_COLLECTION, hris.read_collection(DIVISION_COLLECTION).await?);
    let (sections, skipped_sections) =
        parse_documents(SECTION_COLLECTION, hris.read_collection(SECTION_COLLECTION).await?);
    let (employees, skipped_employees) =
        parse_documents(EMPLOYEE_COLLECTION, hris.read_collection(EMPLOYEE_COLLECTION).await?);

    Ok(HrisSnapshot {
        divisions,
        sections,
        employees,
        skipped: skipped_divisions + skipped_sections + skipped_employees,
    })
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SyncSummary {
    pub divisions: u64,
    pub sections: u64,
    pub employees: u64,
    /// Mirrored employees missing from this snapshot, now inactive
    pub deactivated: u64,
    pub skipped: u64,
    pub elapsed_ms: u64,
}

/// Upserts the snapshot in one transaction. `run_at` has whole seconds so it
/// compares exactly with the stored DATETIME.
pub async fn store_snapshot(
    pool: &MySqlPool,
    snapshot: &HrisSnapshot,
    run_at: NaiveDateTime,
) -> Result<SyncSummary, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for d in &snapshot.divisions {
        sqlx::query(
            r#"
            INSERT INTO divisions_sync (code, name, synced_at) VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE name = VALUES(name), synced_at = VALUES(synced_at)
            "#,
        )
        .bind(&d.code)
        .bind(&d.name)
        .bind(run_at)
        .execute(&mut *tx)
        .await?;
    }

    for s in &snapshot.sections {
        sqlx::query(
            r#"
            INSERT INTO sections_sync (division_code, code, name, synced_at) VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE name = VALUES(name), synced_at = VALUES(synced_at)
            "#,
        )
        .bind(&s.division_code)
        .bind(&s.code)
        .bind(&s.name)
        .bind(run_at)
        .execute(&mut *tx)
        .await?;
    }

    for e in &snapshot.employees {
        sqlx::query(
            r#"
            INSERT INTO employees_sync
                (employee_id, full_name, designation, division_code, division_name,
                 section_code, section_name, is_active, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                full_name = VALUES(full_name),
                designation = VALUES(designation),
                division_code = VALUES(division_code),
                division_name = VALUES(division_name),
                section_code = VALUES(section_code),
                section_name = VALUES(section_name),
                is_active = VALUES(is_active),
                synced_at = VALUES(synced_at)
            "#,
        )
        .bind(&e.employee_id)
        .bind(&e.full_name)
        .bind(&e.designation)
        .bind(&e.division_code)
        .bind(&e.division_name)
        .bind(&e.section_code)
        .bind(&e.section_name)
        .bind(e.is_active.unwrap_or(true))
        .bind(run_at)
        .execute(&mut *tx)
        .await?;
    }

    // An empty upstream answer never wipes the mirror
    let deactivated = if snapshot.employees.is_empty() {
        0
    } else {
        sqlx::query(
            "UPDATE employees_sync SET is_active = FALSE WHERE synced_at < ? AND is_active = TRUE",
        )
        .bind(run_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
    };

    tx.commit().await?;

    Ok(SyncSummary {
        divisions: snapshot.divisions.len() as u64,
        sections: snapshot.sections.len() as u64,
        employees: snapshot.employees.len() as u64,
        deactivated,
        skipped: snapshot.skipped,
        elapsed_ms: 0,
    })
}

#[instrument(name = "hris_sync", skip_all)]
pub async fn sync_from_hris(hris: &HrisClient, pool: &MySqlPool) -> Result<SyncSummary, ApiError> {
    let started = Instant::now();
    let run_at = Utc::now().naive_utc().trunc_subsecs(0);

    let snapshot = fetch_snapshot(hris).await?;
    let mut summary = store_snapshot(pool, &snapshot, run_at).await?;
    summary.elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        divisions = summary.divisions,
        sections = summary.sections,
        employees = summary.employees,
        deactivated = summary.deactivated,
        skipped = summary.skipped,
        elapsed_ms = summary.elapsed_ms,
        "HRIS sync finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn employee_documents_accept_upstream_field_names() {
        let doc = json!({
            "EMP_NUMBER": 10023,
            "FULLNAME": " Nimal Perera ",
            "DESIGNATION": "Machine Operator",
            "DIVISION_CODE": "DIV001",
            "SECTION_CODE": "",
            "ACTIVE_HRM_FLG": 1
        });
        let employee: HrisEmployee = serde_json::from_value(doc).unwrap();

        assert_eq!(employee.employee_id, "10023");
        assert_eq!(employee.full_name, "Nimal Perera");
        assert_eq!(employee.division_code.as_deref(), Some("DIV001"));
        assert_eq!(employee.section_code, None);
        assert_eq!(employee.is_active, Some(true));
    }

    #[test]
    fn unreadable_documents_are_counted_not_fatal() {
        let docs = vec![
            json!({"code": "DIV001", "name": "Production"}),
            json!({"code": null, "name": "Ghost"}),
            json!({"divisionCode": 7, "divisionName": "Stores"}),
        ];
        let (rows, skipped) = parse_documents::<HrisDivision>(DIVISION_COLLECTION, docs);

        assert_eq!(skipped, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].code, "7");
    }

    #[test]
    fn status_strings_map_to_flags() {
        let e: HrisEmployee =
            serde_json::from_value(json!({"employee_id": "E1", "name": "A", "status": "INACTIVE"}))
                .unwrap();
        assert_eq!(e.is_active, Some(false));
    }

    #[tokio::test]
    async fn snapshot_reads_all_three_collections_with_one_login() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"token": "tok"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let collections = [
            ("division", json!([{"code": "DIV001", "name": "Production"}])),
            ("section", json!({"data": [{"division_code": "DIV001", "code": "SEC010", "name": "Assembly"}]})),
            ("employee", json!([{"employee_id": "E1", "full_name": "A"}, {"full_name": "no id"}])),
        ];
        let mut mocks = Vec::new();
        for (collection, body) in collections {
            mocks.push(
                server
                    .mock("POST", "/general-queries/readData")
                    .match_header("authorization", "Bearer tok")
                    .match_body(Matcher::PartialJson(json!({"collection": collection})))
                    .with_status(200)
                    .with_header("content-type", "application/json")
                    .with_body(body.to_string())
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let hris = HrisClient::new(&server.url(), "svc", "svc-pass", 5).unwrap();
        let snapshot = fetch_snapshot(&hris).await.unwrap();

        assert_eq!(snapshot.divisions.len(), 1);
        assert_eq!(snapshot.sections[0].code, "SEC010");
        assert_eq!(snapshot.employees.len(), 1);
        assert_eq!(snapshot.skipped, 1);

        login.assert_async().await;
        for mock in mocks {
            mock.assert_async().await;
        }
    }
}
