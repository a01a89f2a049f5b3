use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::types::{HrisError, LoginRequest, LoginResponse, ReadDataRequest, ReadDataResponse};
use crate::config::Config;

/// Lifetime assumed for tokens that carry no readable `exp` claim.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Authenticated HRIS client. One instance is shared by all workers; the
/// bearer token lives inside it.
pub struct HrisClient {
    http: ReqwestClient,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<CachedToken>>,
}

impl HrisClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout_secs: u64,
    ) -> Result<Self, HrisError> {
        let http = ReqwestClient::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, HrisError> {
        Self::new(
            &config.hris_base_url,
            &config.hris_username,
            &config.hris_password,
            config.hris_timeout_secs,
        )
    }

    /// Obtains a fresh bearer token and caches it with its expiry.
    #[instrument(name = "hris_login", skip(self))]
    pub async fn login(&self) -> Result<String, HrisError> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HrisError::LoginRejected { status, body });
        }

        let token = response
            .json::<LoginResponse>()
            .await?
            .into_token()
            .ok_or(HrisError::MissingToken)?;

        let expires_at = token_expiry(&token)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        info!(%expires_at, "HRIS login successful");

        *self.token.write().await = Some(CachedToken {
            value: token.clone(),
            expires_at,
        });

        Ok(token)
    }

    /// Runs a generic collection query. Logs in when the token is missing or
    /// stale, and retries exactly once after a 401.
    #[instrument(name = "hris_read_data", skip(self, request), fields(collection = %request.collection))]
    pub async fn read_data(&self, request: &ReadDataRequest) -> Result<Vec<Value>, HrisError> {
        let token = self.current_token().await?;

        match self.send_read(request, &token).await? {
            Some(rows) => Ok(rows),
            None => {
                warn!("HRIS token rejected, logging in again");
                self.clear_token().await;
                let token = self.login().await?;

                self.send_read(request, &token)
                    .await?
                    .ok_or(HrisError::Unauthorized)
            }
        }
    }

    /// Whole collection without filter or projection.
    pub async fn read_collection(&self, collection: &str) -> Result<Vec<Value>, HrisError> {
        self.read_data(&ReadDataRequest::all(collection)).await
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    async fn current_token(&self) -> Result<String, HrisError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
            debug!(expired_at = %cached.expires_at, "HRIS token expired");
        }
        self.login().await
    }

    /// `Ok(None)` means the upstream answered 401.
    async fn send_read(
        &self,
        request: &ReadDataRequest,
        token: &str,
    ) -> Result<Option<Vec<Value>>, HrisError> {
        let response = self
            .http
            .post(format!("{}/general-queries/readData", self.base_url))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HrisError::Status { status, body });
        }

        let rows = response
            .json::<ReadDataResponse>()
            .await
            .map_err(|e| HrisError::Payload(e.to_string()))?
            .into_rows();

        debug!(rows = rows.len(), "HRIS readData complete");
        Ok(Some(rows))
    }

    #[cfg(test)]
    pub(crate) async fn seed_token(&self, value: &str, expires_at: DateTime<Utc>) {
        *self.token.write().await = Some(CachedToken {
            value: value.to_string(),
            expires_at,
        });
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Reads the `exp` claim without verifying the signature; the upstream owns the key.
fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    Utc.timestamp_opt(data.claims.exp?, 0).single()
}
