use anyhow::{Context, Result, anyhow};
use sqlx::mysql::MySqlConnectOptions;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database: MySqlConnectOptions,
    pub redis_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    pub default_admin_email: Option<String>,
    pub default_admin_password: Option<String>,

    // Upstream HRIS
    pub hris_base_url: String,
    pub hris_username: String,
    pub hris_password: String,
    pub hris_timeout_secs: u64,

    // Cache lifetimes
    pub dataset_cache_ttl_secs: u64,
    pub report_cache_ttl_secs: u64,
    pub employee_report_cache_ttl_secs: u64,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let database = match lookup("DATABASE_URL") {
            Some(url) => MySqlConnectOptions::from_str(&url)
                .context("DATABASE_URL is not a valid MySQL URL")?,
            None => {
                let options = MySqlConnectOptions::new()
                    .host(&required("MYSQL_HOST")?)
                    .port(parse_or(&lookup, "MYSQL_PORT", 3306u16)?)
                    .username(&required("MYSQL_USER")?)
                    .database(&required("MYSQL_DATABASE")?);
                match lookup("MYSQL_PASSWORD").filter(|p| !p.is_empty()) {
                    Some(password) => options.password(&password),
                    None => options,
                }
            }
        };

        let redis_url = redis_url(
            &lookup("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            parse_or(&lookup, "REDIS_PORT", 6379u16)?,
            lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()).as_deref(),
        );

        Ok(Self {
            database,
            redis_url,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 86_400)?, // 24h

            default_admin_email: lookup("DEFAULT_ADMIN_EMAIL"),
            default_admin_password: lookup("DEFAULT_ADMIN_PASSWORD"),

            hris_base_url: required("HRIS_BASE_URL")?.trim_end_matches('/').to_string(),
            hris_username: required("HRIS_USERNAME")?,
            hris_password: required("HRIS_PASSWORD")?,
            hris_timeout_secs: parse_or(&lookup, "HRIS_TIMEOUT_SECS", 30)?,

            dataset_cache_ttl_secs: parse_or(&lookup, "DATASET_CACHE_TTL_SECS", 30 * 60)?,
            report_cache_ttl_secs: parse_or(&lookup, "REPORT_CACHE_TTL_SECS", 3600)?,
            employee_report_cache_ttl_secs: parse_or(
                &lookup,
                "EMPLOYEE_REPORT_CACHE_TTL_SECS",
                1800,
            )?,

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

fn redis_url(host: &str, port: u16, password: Option<&str>) -> String {
    match password {
        Some(password) => format!(
            "redis://:{}@{host}:{port}/",
            urlencoding::encode(password)
        ),
        None => format!("redis://{host}:{port}/"),
    }
}
