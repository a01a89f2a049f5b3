use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum HrisError {
    #[error("failed to reach HRIS: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HRIS login rejected ({status}): {body}")]
    LoginRejected { status: StatusCode, body: String },

    #[error("HRIS login response carried no token")]
    MissingToken,

    #[error("HRIS rejected the token twice")]
    Unauthorized,

    #[error("HRIS responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected HRIS payload: {0}")]
    Payload(String),
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Login responses seen in the wild put the token at the top level or under `data`.
#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub token: Option<String>,
    pub data: Option<LoginData>,
}

#[derive(Deserialize)]
pub(crate) struct LoginData {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn into_token(self) -> Option<String> {
        self.token
            .or_else(|| self.data.and_then(|d| d.token))
            .filter(|t| !t.is_empty())
    }
}

/// Body of `POST /general-queries/readData`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadDataRequest {
    pub collection: String,
    pub filter_array: Value,
    pub project: Value,
    pub paginate: Value,
}

impl ReadDataRequest {
    /// Whole collection, no filter, default projection.
    pub fn all(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            filter_array: Value::Array(Vec::new()),
            project: Value::Object(Default::default()),
            paginate: Value::Null,
        }
    }
}

/// `readData` returns either the bare array or `{ data: [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ReadDataResponse {
    Rows(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

impl ReadDataResponse {
    pub fn into_rows(self) -> Vec<Value> {
        match self {
            ReadDataResponse::Rows(rows) => rows,
            ReadDataResponse::Wrapped { data } => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_found_at_top_level_or_nested() {
        let top: LoginResponse = serde_json::from_value(json!({"access_token": "a"})).unwrap();
        assert_eq!(top.into_token().as_deref(), Some("a"));

        let nested: LoginResponse =
            serde_json::from_value(json!({"data": {"token": "b"}, "message": "ok"})).unwrap();
        assert_eq!(nested.into_token().as_deref(), Some("b"));

        let empty: LoginResponse = serde_json::from_value(json!({"token": ""})).unwrap();
        assert!(empty.into_token().is_none());
    }

    #[test]
    fn read_data_accepts_both_shapes() {
        let bare: ReadDataResponse = serde_json::from_value(json!([{"a": 1}])).unwrap();
        assert_eq!(bare.into_rows().len(), 1);

        let wrapped: ReadDataResponse =
            serde_json::from_value(json!({"data": [{"a": 1}, {"a": 2}], "total": 2})).unwrap();
        assert_eq!(wrapped.into_rows().len(), 2);
    }
}
